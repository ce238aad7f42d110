//! CLI integration tests.
//!
//! Tests cover:
//! - Config building (general, account, challenge, agent sections)
//! - Market data loading and the train/test split through a MockDataPort
//! - Full train -> test -> backtest runs against CSV files on disk
//! - Exit codes for config, data and model failures

mod common;

use chrono::Duration;
use common::*;
use pipsentry::adapters::file_config_adapter::FileConfigAdapter;
use pipsentry::adapters::report::{PRICE_CHART_FILE, TRADE_LOG_FILE};
use pipsentry::cli::{self, Cli, Command, GeneralConfig, Settings};
use pipsentry::domain::error::PipsentryError;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[general]
pair = EURUSD
timeframe = 1H
data_dir = data
model_dir = models/saved_models
log_dir = logs
test_start = 2025-01-01

[account]
initial_balance = 10000
spread = 1.0

[challenge]
profit_target = 0.08
daily_loss_limit = 0.05
max_drawdown = 0.10
min_trading_days = 5

[agent]
learning_rate = 0.0001
timesteps = 100000
discount = 0.99
epsilon = 0.1
seed = 0
"#;

fn general(test_start: chrono::NaiveDate) -> GeneralConfig {
    GeneralConfig {
        pair: "EURUSD".into(),
        timeframe: "1H".into(),
        data_dir: PathBuf::from("data"),
        model_dir: PathBuf::from("models"),
        log_dir: None,
        log_level: "info".into(),
        test_start,
    }
}

mod config_building {
    use super::*;

    #[test]
    fn valid_ini_builds_settings() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let settings = Settings::from_config(&adapter).unwrap();

        assert_eq!(settings.general.pair, "EURUSD");
        assert_eq!(settings.general.timeframe, "1H");
        assert_eq!(settings.general.data_dir, PathBuf::from("data"));
        assert_eq!(settings.general.model_dir, PathBuf::from("models/saved_models"));
        assert_eq!(settings.general.log_dir, Some(PathBuf::from("logs")));
        assert_eq!(settings.general.test_start, date(2025, 1, 1));

        assert_eq!(settings.env.initial_balance, 10_000.0);
        assert_eq!(settings.env.spread, 1.0);
        assert_eq!(settings.env.daily_loss_limit, 0.05);
        assert_eq!(settings.env.max_drawdown, 0.10);

        assert_eq!(settings.challenge.profit_target, 0.08);
        assert_eq!(settings.challenge.min_trading_days, 5);

        assert_eq!(settings.agent.learning_rate, 0.0001);
        assert_eq!(settings.agent.timesteps, 100_000);
        assert_eq!(settings.agent.seed, 0);
        assert_eq!(settings.default_model_name(), "q_table_EURUSD");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let adapter = FileConfigAdapter::from_string("").unwrap();
        let settings = Settings::from_config(&adapter).unwrap();

        assert_eq!(settings.general.pair, "EURUSD");
        assert_eq!(settings.general.test_start, date(2025, 1, 1));
        assert_eq!(settings.env.initial_balance, 10_000.0);
        assert_eq!(settings.challenge.min_trading_days, 5);
        assert_eq!(settings.agent.discount, 0.99);
        assert_eq!(settings.agent.rollout_len, 2048);
    }

    #[test]
    fn bad_test_start_is_invalid() {
        let adapter =
            FileConfigAdapter::from_string("[general]\ntest_start = 01/01/2025\n").unwrap();
        let err = cli::build_general_config(&adapter).unwrap_err();
        assert!(
            matches!(err, PipsentryError::ConfigInvalid { ref key, .. } if key == "test_start")
        );
    }

    #[test]
    fn malformed_integer_is_invalid_not_defaulted() {
        let adapter =
            FileConfigAdapter::from_string("[challenge]\nmin_trading_days = five\n").unwrap();
        let err = cli::build_challenge_config(&adapter).unwrap_err();
        assert!(
            matches!(err, PipsentryError::ConfigInvalid { ref key, .. } if key == "min_trading_days")
        );
    }

    #[test]
    fn out_of_range_values_rejected() {
        let adapter =
            FileConfigAdapter::from_string("[account]\ninitial_balance = -5\n").unwrap();
        assert!(matches!(
            cli::build_env_config(&adapter).unwrap_err(),
            PipsentryError::ConfigInvalid { ref key, .. } if key == "initial_balance"
        ));

        let adapter = FileConfigAdapter::from_string("[agent]\nepsilon = 1.5\n").unwrap();
        assert!(matches!(
            cli::build_agent_config(&adapter).unwrap_err(),
            PipsentryError::ConfigInvalid { ref key, .. } if key == "epsilon"
        ));

        let adapter = FileConfigAdapter::from_string("[agent]\ntimesteps = 0\n").unwrap();
        assert!(matches!(
            cli::build_agent_config(&adapter).unwrap_err(),
            PipsentryError::ConfigInvalid { ref key, .. } if key == "timesteps"
        ));
    }

    #[test]
    fn load_config_from_file() {
        let file = write_temp_ini(VALID_INI);
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.general.pair, "EURUSD");
    }

    #[test]
    fn load_config_missing_file() {
        let err = Settings::load(Path::new("/nonexistent/pipsentry.ini")).unwrap_err();
        assert!(matches!(err, PipsentryError::ConfigParse { .. }));
    }
}

mod data_loading {
    use super::*;

    #[test]
    fn loads_and_splits_at_test_start() {
        // 2025-01-06 00:00 plus 240 hours runs to 2025-01-15 23:00
        let port = MockDataPort::new().with_bars("EURUSD", "1H", wave_ohlc(start_time(), 240));
        let general = general(date(2025, 1, 10));

        let data = cli::load_market_data(&port, &general).unwrap();
        assert_eq!(data.len(), 240 - 49);

        let (train, test) = cli::split_market_data(&data, &general).unwrap();
        assert_eq!(train.len() + test.len(), data.len());
        assert!(train.last_timestamp() < date(2025, 1, 10).and_hms_opt(0, 0, 0).unwrap());
        assert_eq!(
            test.first_timestamp(),
            date(2025, 1, 10).and_hms_opt(0, 0, 0).unwrap()
        );
    }

    #[test]
    fn source_is_read_once() {
        let port = MockDataPort::new().with_bars("EURUSD", "1H", wave_ohlc(start_time(), 120));
        cli::load_market_data(&port, &general(date(2025, 1, 8))).unwrap();
        assert_eq!(port.fetch_calls.get(), 1);
        assert_eq!(port.range_calls.get(), 0);
    }

    #[test]
    fn missing_pair_is_insufficient_data() {
        let port = MockDataPort::new();
        let err = cli::load_market_data(&port, &general(date(2025, 1, 10))).unwrap_err();
        assert!(matches!(
            err,
            PipsentryError::InsufficientData { bars: 0, ref pair, .. } if pair == "EURUSD"
        ));
    }

    #[test]
    fn source_error_propagates() {
        let port = MockDataPort::new().with_error("EURUSD", "1H", "disk on fire");
        let err = cli::load_market_data(&port, &general(date(2025, 1, 10))).unwrap_err();
        assert!(matches!(err, PipsentryError::DataSource { .. }));
    }

    #[test]
    fn test_start_after_data_is_insufficient() {
        let port = MockDataPort::new().with_bars("EURUSD", "1H", wave_ohlc(start_time(), 240));
        let general = general(date(2026, 1, 1));
        let data = cli::load_market_data(&port, &general).unwrap();

        let err = cli::split_market_data(&data, &general).unwrap_err();
        assert!(matches!(err, PipsentryError::InsufficientData { bars: 0, .. }));
    }
}

mod end_to_end {
    use super::*;
    use std::fs;

    struct Workspace {
        dir: TempDir,
        config: PathBuf,
    }

    /// Data spanning the training and test periods plus a matching INI file.
    fn workspace() -> Workspace {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();
        let start = date(2024, 12, 20).and_hms_opt(0, 0, 0).unwrap();
        write_ohlc_csv(&data_dir, "EURUSD", "1H", &wave_ohlc(start, 24 * 24));
        assert!(start + Duration::hours(24 * 24) > date(2025, 1, 1).and_hms_opt(0, 0, 0).unwrap());

        let ini = format!(
            "[general]\npair = EURUSD\ntimeframe = 1H\ndata_dir = {data}\nmodel_dir = {models}\n\
             log_dir = {logs}\ntest_start = 2025-01-01\n\n\
             [account]\ninitial_balance = 10000\nspread = 1.0\n\n\
             [agent]\nlearning_rate = 0.1\ntimesteps = 500\nrollout_len = 100\nseed = 7\n",
            data = data_dir.display(),
            models = dir.path().join("models").display(),
            logs = dir.path().join("logs").display(),
        );
        let config = dir.path().join("pipsentry.ini");
        fs::write(&config, ini).unwrap();
        Workspace { dir, config }
    }

    // ExitCode has no PartialEq; compare the Debug rendering.
    fn code(exit: ExitCode) -> String {
        format!("{:?}", exit)
    }

    fn run(command: Command) -> String {
        code(cli::run(Cli { command }))
    }

    #[test]
    fn validate_and_info_succeed() {
        let ws = workspace();
        assert_eq!(
            run(Command::Validate {
                config: ws.config.clone()
            }),
            code(ExitCode::SUCCESS)
        );
        assert_eq!(
            run(Command::Info {
                config: ws.config.clone()
            }),
            code(ExitCode::SUCCESS)
        );
    }

    #[test]
    fn train_then_test_then_backtest() {
        let ws = workspace();

        assert_eq!(
            run(Command::Train {
                config: ws.config.clone()
            }),
            code(ExitCode::SUCCESS)
        );
        let model = ws
            .dir
            .path()
            .join("models/q_table_EURUSD/q_table_EURUSD.json");
        assert!(model.is_file());
        assert!(ws
            .dir
            .path()
            .join("models/q_table_EURUSD/q_table_EURUSD_metadata.json")
            .is_file());

        assert_eq!(
            run(Command::Test {
                config: ws.config.clone(),
                model: None,
            }),
            code(ExitCode::SUCCESS)
        );

        let out = ws.dir.path().join("out");
        assert_eq!(
            run(Command::Backtest {
                config: ws.config.clone(),
                model: None,
                rule_based: false,
                output_dir: Some(out.clone()),
                deterministic: true,
            }),
            code(ExitCode::SUCCESS)
        );
        assert!(out.join(TRADE_LOG_FILE).is_file());
        assert!(out.join(PRICE_CHART_FILE).is_file());
    }

    #[test]
    fn rule_based_backtest_needs_no_model() {
        let ws = workspace();
        let out = ws.dir.path().join("rule_based");
        assert_eq!(
            run(Command::Backtest {
                config: ws.config.clone(),
                model: None,
                rule_based: true,
                output_dir: Some(out.clone()),
                deterministic: false,
            }),
            code(ExitCode::SUCCESS)
        );
        assert!(out.join(TRADE_LOG_FILE).is_file());
    }

    #[test]
    fn missing_model_exits_with_model_code() {
        let ws = workspace();
        assert_eq!(
            run(Command::Backtest {
                config: ws.config.clone(),
                model: Some("absent".into()),
                rule_based: false,
                output_dir: Some(ws.dir.path().join("out")),
                deterministic: true,
            }),
            code(ExitCode::from(5))
        );
    }

    #[test]
    fn invalid_config_exits_with_config_code() {
        let file = write_temp_ini("[account]\nspread = wide\n");
        assert_eq!(
            run(Command::Validate {
                config: file.path().to_path_buf()
            }),
            code(ExitCode::from(2))
        );
    }

    #[test]
    fn missing_data_exits_with_data_code() {
        let dir = TempDir::new().unwrap();
        let file = write_temp_ini(&format!(
            "[general]\ndata_dir = {}\nlog_dir =\n",
            dir.path().display()
        ));
        assert_eq!(
            run(Command::Backtest {
                config: file.path().to_path_buf(),
                model: None,
                rule_based: true,
                output_dir: Some(dir.path().join("out")),
                deterministic: false,
            }),
            code(ExitCode::from(3))
        );
    }
}
