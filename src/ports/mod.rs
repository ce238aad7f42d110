//! Port traits between the domain and its adapters.

pub mod agent_port;
pub mod config_port;
pub mod data_port;
pub mod report_port;
