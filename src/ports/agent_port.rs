//! Agent port trait: anything that maps observations to actions.

use std::path::Path;

use crate::domain::action::{Action, ActionCounts};
use crate::domain::environment::{MarketContext, TradingEnv};
use crate::domain::error::PipsentryError;
use crate::domain::observation::Observation;

/// Summary of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub steps: usize,
    pub episodes: usize,
    pub total_reward: f64,
    pub action_counts: ActionCounts,
}

impl TrainingReport {
    pub fn mean_reward(&self) -> f64 {
        if self.steps == 0 {
            0.0
        } else {
            self.total_reward / self.steps as f64
        }
    }
}

pub trait Agent {
    fn name(&self) -> &str;

    /// Choose an action. `deterministic` disables exploration.
    fn predict(
        &mut self,
        observation: &Observation,
        context: &MarketContext<'_>,
        deterministic: bool,
    ) -> Result<Action, PipsentryError>;

    /// Interact with `env` for `total_steps` steps, resetting whenever an
    /// episode ends.
    fn train(
        &mut self,
        env: &mut TradingEnv,
        total_steps: usize,
    ) -> Result<TrainingReport, PipsentryError>;

    fn save(&self, path: &Path) -> Result<(), PipsentryError>;

    fn load(&mut self, path: &Path) -> Result<(), PipsentryError>;
}
