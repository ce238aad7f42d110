//! CLI definition and dispatch.

use chrono::{Local, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::model_store::{ModelMetadata, ModelStore};
use crate::adapters::q_table_agent::{AgentConfig, QTableAgent};
use crate::adapters::report::{FileReportAdapter, tables};
use crate::adapters::rule_based_agent::RuleBasedAgent;
use crate::domain::backtest::{self as backtest_engine, ChallengeConfig};
use crate::domain::config_validation::{parse_date, parse_key, validate_config};
use crate::domain::environment::{EnvConfig, TradingEnv};
use crate::domain::error::PipsentryError;
use crate::domain::market_data::{MIN_BARS, MarketData};
use crate::domain::metrics::Metrics;
use crate::domain::preprocess::prepare_bars;
use crate::logging;
use crate::ports::agent_port::Agent;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_OUTPUT_DIR: &str = "backtest_plots";

#[derive(Parser, Debug)]
#[command(name = "pipsentry", about = "PipSentry: RL Forex Trading Simulator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train the Q-table agent on bars before test_start and save it
    Train {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Replay one episode over the training bars with a saved model
    Test {
        #[arg(short, long)]
        config: PathBuf,
        /// Model name under model_dir (default: q_table_<PAIR>)
        #[arg(short, long)]
        model: Option<String>,
    },
    /// Run the prop-firm challenge backtest on bars from test_start onwards
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        model: Option<String>,
        /// Use the moving-average crossover agent instead of a saved model
        #[arg(long)]
        rule_based: bool,
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Always take the greedy action
        #[arg(long)]
        deterministic: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show the data range and split for the configured pair
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let outcome = match cli.command {
        Command::Train { config } => run_train(&config),
        Command::Test { config, model } => run_test(&config, model.as_deref()),
        Command::Backtest {
            config,
            model,
            rule_based,
            output_dir,
            deterministic,
        } => run_backtest(
            &config,
            model.as_deref(),
            rule_based,
            output_dir.as_deref(),
            deterministic,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config } => run_info(&config),
    };
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PipsentryError> {
    eprintln!("Loading config from {}", path.display());
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_config(&adapter)?;
    Ok(adapter)
}

/// The `[general]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralConfig {
    pub pair: String,
    pub timeframe: String,
    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub log_dir: Option<PathBuf>,
    pub log_level: String,
    pub test_start: NaiveDate,
}

pub fn build_general_config(adapter: &dyn ConfigPort) -> Result<GeneralConfig, PipsentryError> {
    let get = |key: &str, default: &str| {
        adapter
            .get_string("general", key)
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| default.to_string())
    };
    let test_start = parse_date(&get("test_start", "2025-01-01"), "general", "test_start")?;
    let log_dir = get("log_dir", "logs");

    Ok(GeneralConfig {
        pair: get("pair", "EURUSD").to_uppercase(),
        timeframe: get("timeframe", "1H").to_uppercase(),
        data_dir: PathBuf::from(get("data_dir", "data")),
        model_dir: PathBuf::from(get("model_dir", "models/saved_models")),
        log_dir: (!log_dir.is_empty()).then(|| PathBuf::from(log_dir)),
        log_level: get("log_level", "info"),
        test_start,
    })
}

pub fn build_env_config(adapter: &dyn ConfigPort) -> Result<EnvConfig, PipsentryError> {
    let defaults = EnvConfig::default();
    EnvConfig::new(
        adapter.get_double("account", "initial_balance", defaults.initial_balance),
        adapter.get_double("challenge", "daily_loss_limit", defaults.daily_loss_limit),
        adapter.get_double("challenge", "max_drawdown", defaults.max_drawdown),
        adapter.get_double("account", "spread", defaults.spread),
    )
}

pub fn build_challenge_config(adapter: &dyn ConfigPort) -> Result<ChallengeConfig, PipsentryError> {
    let defaults = ChallengeConfig::default();
    let config = ChallengeConfig {
        profit_target: adapter.get_double("challenge", "profit_target", defaults.profit_target),
        daily_loss_limit: adapter.get_double(
            "challenge",
            "daily_loss_limit",
            defaults.daily_loss_limit,
        ),
        max_drawdown: adapter.get_double("challenge", "max_drawdown", defaults.max_drawdown),
        min_trading_days: parse_key(adapter, "challenge", "min_trading_days")?
            .unwrap_or(defaults.min_trading_days),
    };
    config.validate()?;
    Ok(config)
}

pub fn build_agent_config(adapter: &dyn ConfigPort) -> Result<AgentConfig, PipsentryError> {
    let defaults = AgentConfig::default();
    let config = AgentConfig {
        learning_rate: adapter.get_double("agent", "learning_rate", defaults.learning_rate),
        discount: adapter.get_double("agent", "discount", defaults.discount),
        epsilon: adapter.get_double("agent", "epsilon", defaults.epsilon),
        seed: parse_key(adapter, "agent", "seed")?.unwrap_or(defaults.seed),
        timesteps: parse_key(adapter, "agent", "timesteps")?.unwrap_or(defaults.timesteps),
        rollout_len: parse_key(adapter, "agent", "rollout_len")?.unwrap_or(defaults.rollout_len),
    };
    config.validate()?;
    if config.timesteps == 0 {
        return Err(PipsentryError::config_invalid(
            "agent",
            "timesteps",
            "timesteps must be at least 1",
        ));
    }
    Ok(config)
}

/// Everything a run needs, built from one validated config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub general: GeneralConfig,
    pub env: EnvConfig,
    pub challenge: ChallengeConfig,
    pub agent: AgentConfig,
}

impl Settings {
    pub fn from_config(adapter: &dyn ConfigPort) -> Result<Self, PipsentryError> {
        Ok(Settings {
            general: build_general_config(adapter)?,
            env: build_env_config(adapter)?,
            challenge: build_challenge_config(adapter)?,
            agent: build_agent_config(adapter)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self, PipsentryError> {
        Self::from_config(&load_config(path)?)
    }

    pub fn default_model_name(&self) -> String {
        ModelStore::default_name("q_table", &self.general.pair)
    }

    fn init_logging(&self, mode: &str) -> Result<Option<WorkerGuard>, PipsentryError> {
        let log_file = self
            .general
            .log_dir
            .as_deref()
            .map(|dir| logging::log_file_path(dir, mode));
        logging::init_tracing(&self.general.log_level, log_file.as_deref())
    }
}

/// Read, preprocess and validate every bar of the configured pair.
pub fn load_market_data(
    data_port: &dyn DataPort,
    general: &GeneralConfig,
) -> Result<MarketData, PipsentryError> {
    let insufficient = |bars: usize| PipsentryError::InsufficientData {
        pair: general.pair.clone(),
        timeframe: general.timeframe.clone(),
        bars,
        minimum: MIN_BARS,
    };

    let raw = data_port.fetch_ohlc(
        &general.pair,
        &general.timeframe,
        NaiveDate::MIN,
        NaiveDate::MAX,
    )?;
    let (Some(first), Some(last)) = (raw.first(), raw.last()) else {
        return Err(insufficient(0));
    };
    let (first, last, rows) = (first.timestamp.date(), last.timestamp.date(), raw.len());
    let bars = prepare_bars(&raw)?;
    if bars.len() < MIN_BARS {
        return Err(insufficient(bars.len()));
    }
    info!(
        pair = %general.pair,
        timeframe = %general.timeframe,
        %first,
        %last,
        rows,
        bars = bars.len(),
        "market data loaded"
    );
    MarketData::new(bars)
}

/// Split into (training, test) at midnight of `test_start`.
pub fn split_market_data(
    data: &MarketData,
    general: &GeneralConfig,
) -> Result<(MarketData, MarketData), PipsentryError> {
    let at = general.test_start.and_time(NaiveTime::MIN);
    data.split_at(at).map_err(|_| {
        let before = data.bars().partition_point(|b| b.timestamp < at);
        PipsentryError::InsufficientData {
            pair: general.pair.clone(),
            timeframe: general.timeframe.clone(),
            bars: before.min(data.len() - before),
            minimum: MIN_BARS,
        }
    })
}

fn load_splits(settings: &Settings) -> Result<(MarketData, MarketData), PipsentryError> {
    let adapter = CsvAdapter::new(settings.general.data_dir.clone());
    let data = load_market_data(&adapter, &settings.general)?;
    split_market_data(&data, &settings.general)
}

fn run_train(config_path: &Path) -> Result<(), PipsentryError> {
    let settings = Settings::load(config_path)?;
    let _guard = settings.init_logging("train")?;
    let (train_data, _) = load_splits(&settings)?;
    eprintln!("Training data: {} bars", train_data.len());

    let mut env = TradingEnv::new(train_data, settings.env.clone())?;
    let mut agent = QTableAgent::new(settings.agent.clone())?;
    info!(
        pair = %settings.general.pair,
        timesteps = settings.agent.timesteps,
        "training started"
    );
    let report = agent.train(&mut env, settings.agent.timesteps)?;

    let store = ModelStore::new(settings.general.model_dir.clone());
    let metadata = ModelMetadata {
        agent: agent.name().to_string(),
        pair: settings.general.pair.clone(),
        timeframe: settings.general.timeframe.clone(),
        trained_at: Local::now().naive_local(),
        timesteps: report.steps,
    };
    let path = store.save(&agent, &settings.default_model_name(), &metadata)?;

    eprintln!(
        "Training complete: {} steps, {} episodes, mean reward {:.4}",
        report.steps,
        report.episodes,
        report.mean_reward()
    );
    eprintln!("Model saved to {}", path.display());
    Ok(())
}

fn load_q_table(settings: &Settings, model: Option<&str>) -> Result<QTableAgent, PipsentryError> {
    let name = model.map_or_else(|| settings.default_model_name(), str::to_string);
    let store = ModelStore::new(settings.general.model_dir.clone());
    let mut agent = QTableAgent::new(settings.agent.clone())?;
    store.load(&mut agent, &name)?;
    info!(model = %name, steps_trained = agent.steps_trained(), "model loaded");
    Ok(agent)
}

fn run_test(config_path: &Path, model: Option<&str>) -> Result<(), PipsentryError> {
    let settings = Settings::load(config_path)?;
    let _guard = settings.init_logging("test")?;
    let (train_data, _) = load_splits(&settings)?;

    let mut agent = load_q_table(&settings, model)?;
    let mut env = TradingEnv::new(train_data, settings.env.clone())?;
    let stats = backtest_engine::run_episode(&mut env, &mut agent, false)?;

    println!("Steps: {}", stats.steps);
    println!("Total Reward: {:.4}", stats.total_reward);
    println!("Final Balance: {:.2}", stats.final_balance);
    println!("Final Equity: {:.2}", stats.final_equity);
    println!("Action Counts: {}", stats.action_counts);
    Ok(())
}

fn run_backtest(
    config_path: &Path,
    model: Option<&str>,
    rule_based: bool,
    output_dir: Option<&Path>,
    deterministic: bool,
) -> Result<(), PipsentryError> {
    let settings = Settings::load(config_path)?;
    let _guard = settings.init_logging("backtest")?;
    let (_, test_data) = load_splits(&settings)?;
    eprintln!(
        "Backtesting {} bars from {}",
        test_data.len(),
        test_data.first_timestamp()
    );

    let mut agent: Box<dyn Agent> = if rule_based {
        Box::new(RuleBasedAgent::new())
    } else {
        Box::new(load_q_table(&settings, model)?)
    };

    let mut env = TradingEnv::new(test_data, settings.env.clone())?;
    let result = backtest_engine::run_backtest(
        &mut env,
        agent.as_mut(),
        &settings.challenge,
        deterministic,
    )?;
    let metrics = Metrics::compute(&result, &settings.challenge);

    println!("{}", tables::format_summary(&result, &metrics));
    println!("{}", tables::format_trade_table(&result.trades));

    let output_dir = output_dir.unwrap_or_else(|| Path::new(DEFAULT_OUTPUT_DIR));
    let title = format!(
        "{} {} backtest ({})",
        settings.general.pair,
        settings.general.timeframe,
        agent.name()
    );
    FileReportAdapter::new(title).write(&result, &metrics, output_dir)?;
    eprintln!(
        "Trade analysis saved to {}",
        FileReportAdapter::trade_log_path(output_dir).display()
    );
    eprintln!(
        "Price chart saved to {}",
        FileReportAdapter::price_chart_path(output_dir).display()
    );
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), PipsentryError> {
    let settings = Settings::load(config_path)?;
    let general = &settings.general;

    println!("Configuration is valid.");
    println!("  Pair:            {} {}", general.pair, general.timeframe);
    println!("  Data dir:        {}", general.data_dir.display());
    println!("  Model dir:       {}", general.model_dir.display());
    println!("  Test start:      {}", general.test_start);
    println!("  Initial balance: {:.2}", settings.env.initial_balance);
    println!("  Spread (pips):   {:.1}", settings.env.spread);
    println!(
        "  Challenge:       target {:.1}%, daily loss {:.1}%, drawdown {:.1}%, {} days",
        settings.challenge.profit_target * 100.0,
        settings.challenge.daily_loss_limit * 100.0,
        settings.challenge.max_drawdown * 100.0,
        settings.challenge.min_trading_days
    );
    println!(
        "  Agent:           lr {}, discount {}, epsilon {}, {} timesteps",
        settings.agent.learning_rate,
        settings.agent.discount,
        settings.agent.epsilon,
        settings.agent.timesteps
    );
    Ok(())
}

fn run_info(config_path: &Path) -> Result<(), PipsentryError> {
    let settings = Settings::load(config_path)?;
    let general = &settings.general;
    let _guard = logging::init_tracing(&general.log_level, None)?;
    let adapter = CsvAdapter::new(general.data_dir.clone());

    println!("File: {}", adapter.csv_path(&general.pair, &general.timeframe).display());
    match adapter.get_data_range(&general.pair, &general.timeframe)? {
        Some((first, last, rows)) => {
            println!("  Rows:   {}", rows);
            println!("  Range:  {} to {}", first, last);
        }
        None => {
            println!("  No data");
            return Ok(());
        }
    }

    let data = load_market_data(&adapter, general)?;
    let before = data
        .bars()
        .partition_point(|b| b.timestamp < general.test_start.and_time(NaiveTime::MIN));
    println!("  Usable bars (after indicator warmup): {}", data.len());
    println!("  Training bars (before {}): {}", general.test_start, before);
    println!("  Test bars: {}", data.len() - before);

    let store = ModelStore::new(general.model_dir.clone());
    let name = settings.default_model_name();
    if store.exists(&name) {
        match store.load_metadata(&name) {
            Ok(meta) => println!(
                "  Model:  {} (trained {}, {} steps)",
                name, meta.trained_at, meta.timesteps
            ),
            Err(_) => println!("  Model:  {}", name),
        }
    } else {
        println!("  Model:  none");
    }
    Ok(())
}
