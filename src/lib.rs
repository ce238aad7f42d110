//! pipsentry: reinforcement-learning forex trading simulator.
//!
//! Hexagonal architecture: the trading environment, episode drivers and
//! metrics live in [`domain`], port traits in [`ports`], concrete agents,
//! data loaders and report writers in [`adapters`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
pub mod logging;
