//! Moving-average crossover agent: long while SMA20 is above SMA50.

use std::path::Path;

use crate::domain::action::Action;
use crate::domain::environment::{MarketContext, TradingEnv};
use crate::domain::error::PipsentryError;
use crate::domain::observation::Observation;
use crate::domain::position::Direction;
use crate::ports::agent_port::{Agent, TrainingReport};

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedAgent;

impl RuleBasedAgent {
    pub fn new() -> Self {
        RuleBasedAgent
    }

    pub fn decide(context: &MarketContext<'_>) -> Action {
        let bar = context.bar;
        let flat = context.direction == Direction::Flat;
        if bar.sma20 > bar.sma50 && flat {
            Action::Buy
        } else if bar.sma20 < bar.sma50 && !flat {
            Action::Sell
        } else {
            Action::Hold
        }
    }
}

impl Agent for RuleBasedAgent {
    fn name(&self) -> &str {
        "rule_based"
    }

    fn predict(
        &mut self,
        _observation: &Observation,
        context: &MarketContext<'_>,
        _deterministic: bool,
    ) -> Result<Action, PipsentryError> {
        Ok(Self::decide(context))
    }

    fn train(
        &mut self,
        _env: &mut TradingEnv,
        _total_steps: usize,
    ) -> Result<TrainingReport, PipsentryError> {
        Ok(TrainingReport::default())
    }

    fn save(&self, _path: &Path) -> Result<(), PipsentryError> {
        Ok(())
    }

    fn load(&mut self, _path: &Path) -> Result<(), PipsentryError> {
        Ok(())
    }
}
