//! Tracing subscriber setup.
//!
//! `PIPSENTRY_LOG` overrides the level passed on the command line and accepts
//! any `EnvFilter` directive (e.g. `pipsentry=debug`).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::domain::error::PipsentryError;

pub const LOG_ENV_VAR: &str = "PIPSENTRY_LOG";

/// `<log_dir>/<mode>_<YYYY-MM-DD_HH-MM>.log`
pub fn log_file_path(log_dir: &Path, mode: &str) -> PathBuf {
    log_dir.join(format!(
        "{}_{}.log",
        mode,
        Local::now().format("%Y-%m-%d_%H-%M")
    ))
}

fn build_filter(level: &str) -> Result<EnvFilter, PipsentryError> {
    let directive = std::env::var(LOG_ENV_VAR)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| level.to_string());
    EnvFilter::try_new(&directive).map_err(|e| {
        PipsentryError::config_invalid(
            "general",
            "log_level",
            format!("invalid log filter {:?}: {}", directive, e),
        )
    })
}

/// Install the global subscriber: stderr always, plus a plain-text file
/// when `log_file` is given. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init_tracing(
    level: &str,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>, PipsentryError> {
    let filter = build_filter(level)?;

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            fs::create_dir_all(dir)?;
            let file_name = path.file_name().ok_or_else(|| {
                PipsentryError::config_invalid("general", "log_dir", "log path has no file name")
            })?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    if tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("tracing subscriber already installed");
    }
    Ok(guard)
}
