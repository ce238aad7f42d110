//! Concrete adapter implementations for ports.

pub mod csv_adapter;
pub mod file_config_adapter;
pub mod model_store;
pub mod q_table_agent;
pub mod report;
pub mod rule_based_agent;
