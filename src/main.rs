use clap::Parser;
use pipsentry::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
