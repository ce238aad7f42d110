//! Configuration validation.
//!
//! Validates every config field before a run starts. Keys may be omitted
//! (defaults apply), but a present value that does not parse or is out of
//! range is an error, never coerced.

use crate::domain::error::PipsentryError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::str::FromStr;

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), PipsentryError> {
    validate_general(config)?;
    validate_account(config)?;
    validate_challenge(config)?;
    validate_agent(config)?;
    Ok(())
}

pub fn validate_general(config: &dyn ConfigPort) -> Result<(), PipsentryError> {
    for key in ["pair", "timeframe"] {
        match config.get_string("general", key) {
            Some(value) if !is_symbol(&value) => {
                return Err(PipsentryError::config_invalid(
                    "general",
                    key,
                    format!("{} must be alphanumeric, got {:?}", key, value),
                ));
            }
            _ => {}
        }
    }
    if let Some(value) = config.get_string("general", "test_start") {
        parse_date(&value, "general", "test_start")?;
    }
    Ok(())
}

pub fn validate_account(config: &dyn ConfigPort) -> Result<(), PipsentryError> {
    let balance = parse_key::<f64>(config, "account", "initial_balance")?;
    if balance.is_some_and(|v| !v.is_finite() || v <= 0.0) {
        return Err(PipsentryError::config_invalid(
            "account",
            "initial_balance",
            "initial_balance must be positive",
        ));
    }
    let spread = parse_key::<f64>(config, "account", "spread")?;
    if spread.is_some_and(|v| !v.is_finite() || v < 0.0) {
        return Err(PipsentryError::config_invalid(
            "account",
            "spread",
            "spread must be non-negative",
        ));
    }
    Ok(())
}

pub fn validate_challenge(config: &dyn ConfigPort) -> Result<(), PipsentryError> {
    for key in ["profit_target", "daily_loss_limit", "max_drawdown"] {
        let value = parse_key::<f64>(config, "challenge", key)?;
        if value.is_some_and(|v| !(v > 0.0 && v <= 1.0)) {
            return Err(PipsentryError::config_invalid(
                "challenge",
                key,
                format!("{} must be in (0, 1]", key),
            ));
        }
    }
    parse_key::<usize>(config, "challenge", "min_trading_days")?;
    Ok(())
}

pub fn validate_agent(config: &dyn ConfigPort) -> Result<(), PipsentryError> {
    for key in ["learning_rate", "discount", "epsilon"] {
        let value = parse_key::<f64>(config, "agent", key)?;
        if value.is_some_and(|v| !(0.0..=1.0).contains(&v)) {
            return Err(PipsentryError::config_invalid(
                "agent",
                key,
                format!("{} must be in [0, 1]", key),
            ));
        }
    }
    for key in ["timesteps", "rollout_len"] {
        if parse_key::<usize>(config, "agent", key)? == Some(0) {
            return Err(PipsentryError::config_invalid(
                "agent",
                key,
                format!("{} must be at least 1", key),
            ));
        }
    }
    parse_key::<u64>(config, "agent", "seed")?;
    Ok(())
}

pub fn parse_date(value: &str, section: &str, key: &str) -> Result<NaiveDate, PipsentryError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        PipsentryError::config_invalid(section, key, "invalid date format, expected YYYY-MM-DD")
    })
}

/// Parse `[section] key` as `T`. `Ok(None)` when the key is absent.
pub fn parse_key<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<T>, PipsentryError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            PipsentryError::config_invalid(section, key, format!("cannot parse {:?}", raw))
        }),
    }
}

fn is_symbol(value: &str) -> bool {
    !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric())
}
