//! Core domain types and logic.

pub mod error;
pub mod ohlcv;
pub mod market_data;
pub mod action;
pub mod position;
pub mod account;
pub mod observation;
pub mod reward;
pub mod environment;
pub mod indicator;
pub mod preprocess;
pub mod backtest;
pub mod metrics;
pub mod config_validation;
