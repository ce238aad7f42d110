//! Tabular Q-learning agent over a coarse discretization of the observation.
//!
//! State buckets: RSI (4) x MACD above/below signal (2) x ATR (3) x position
//! direction (3). Exploration is epsilon-greedy from a seeded `StdRng`, so a
//! given seed and data set always train the same table.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::action::{Action, ActionCounts};
use crate::domain::environment::{MarketContext, TradingEnv};
use crate::domain::error::PipsentryError;
use crate::domain::observation::{ATR_INDEX, MACD_INDEX, Observation, RSI_INDEX, SIGNAL_INDEX};
use crate::domain::position::Direction;
use crate::ports::agent_port::{Agent, TrainingReport};

const RSI_BUCKETS: usize = 4;
const MACD_BUCKETS: usize = 2;
const ATR_BUCKETS: usize = 3;
const DIRECTION_BUCKETS: usize = 3;
pub const STATE_COUNT: usize = RSI_BUCKETS * MACD_BUCKETS * ATR_BUCKETS * DIRECTION_BUCKETS;

const MODEL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub learning_rate: f64,
    pub discount: f64,
    pub epsilon: f64,
    pub seed: u64,
    pub timesteps: usize,
    /// Steps per rollout summary in the training log.
    pub rollout_len: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            learning_rate: 0.0001,
            discount: 0.99,
            epsilon: 0.1,
            seed: 0,
            timesteps: 100_000,
            rollout_len: 2048,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), PipsentryError> {
        for (key, value) in [
            ("learning_rate", self.learning_rate),
            ("discount", self.discount),
            ("epsilon", self.epsilon),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipsentryError::config_invalid(
                    "agent",
                    key,
                    format!("{} must be in [0, 1]", key),
                ));
            }
        }
        if self.rollout_len == 0 {
            return Err(PipsentryError::config_invalid(
                "agent",
                "rollout_len",
                "rollout_len must be at least 1",
            ));
        }
        Ok(())
    }
}

/// On-disk form of a trained agent.
#[derive(Debug, Serialize, Deserialize)]
struct QTableModel {
    version: u32,
    config: AgentConfig,
    steps_trained: usize,
    q_values: Vec<[f64; 3]>,
}

#[derive(Debug)]
pub struct QTableAgent {
    config: AgentConfig,
    q_values: Vec<[f64; 3]>,
    steps_trained: usize,
    rng: StdRng,
}

impl QTableAgent {
    pub fn new(config: AgentConfig) -> Result<Self, PipsentryError> {
        config.validate()?;
        Ok(QTableAgent {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            q_values: vec![[0.0; 3]; STATE_COUNT],
            steps_trained: 0,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn steps_trained(&self) -> usize {
        self.steps_trained
    }

    pub fn q_values(&self, observation: &Observation) -> [f64; 3] {
        self.q_values[state_index(observation)]
    }

    pub fn greedy(&self, observation: &Observation) -> Action {
        let q = self.q_values(observation);
        let best = (1..q.len()).fold(0, |best, i| if q[i] > q[best] { i } else { best });
        Action::ALL[best]
    }

    fn explore(&mut self, observation: &Observation) -> Action {
        if self.rng.gen_bool(self.config.epsilon) {
            Action::ALL[self.rng.gen_range(0..Action::ALL.len())]
        } else {
            self.greedy(observation)
        }
    }

    fn update(&mut self, state: usize, action: Action, reward: f64, next: usize, done: bool) {
        let future = if done {
            0.0
        } else {
            self.q_values[next].iter().copied().fold(f64::NEG_INFINITY, f64::max)
        };
        let target = reward + self.config.discount * future;
        let q = &mut self.q_values[state][action.index()];
        *q += self.config.learning_rate * (target - *q);
    }
}

/// Map an observation onto its Q-table row.
pub fn state_index(observation: &Observation) -> usize {
    let rsi = observation.get(RSI_INDEX) * 100.0;
    let rsi_bucket = match rsi {
        r if r < 30.0 => 0,
        r if r < 50.0 => 1,
        r if r < 70.0 => 2,
        _ => 3,
    };
    let macd_bucket = usize::from(observation.get(MACD_INDEX) > observation.get(SIGNAL_INDEX));
    // ATR in units of 0.001 price
    let atr = observation.get(ATR_INDEX);
    let atr_bucket = match atr {
        a if a < 0.5 => 0,
        a if a < 1.5 => 1,
        _ => 2,
    };
    let direction_bucket = match observation.direction() {
        Direction::Short => 0,
        Direction::Flat => 1,
        Direction::Long => 2,
    };
    ((rsi_bucket * MACD_BUCKETS + macd_bucket) * ATR_BUCKETS + atr_bucket) * DIRECTION_BUCKETS
        + direction_bucket
}

impl Agent for QTableAgent {
    fn name(&self) -> &str {
        "q_table"
    }

    fn predict(
        &mut self,
        observation: &Observation,
        _context: &MarketContext<'_>,
        deterministic: bool,
    ) -> Result<Action, PipsentryError> {
        Ok(if deterministic {
            self.greedy(observation)
        } else {
            self.explore(observation)
        })
    }

    fn train(
        &mut self,
        env: &mut TradingEnv,
        total_steps: usize,
    ) -> Result<TrainingReport, PipsentryError> {
        let mut report = TrainingReport::default();
        let mut rollout_reward = 0.0;
        let mut rollout_counts = ActionCounts::default();
        let (mut observation, _) = env.reset();

        info!(
            total_steps,
            learning_rate = self.config.learning_rate,
            epsilon = self.config.epsilon,
            "training started"
        );

        for step in 1..=total_steps {
            let state = state_index(&observation);
            let action = self.explore(&observation);
            let result = env.step(action)?;
            let next = state_index(&result.observation);
            self.update(state, action, result.reward, next, result.done);

            report.total_reward += result.reward;
            report.action_counts.record(action);
            rollout_reward += result.reward;
            rollout_counts.record(action);

            observation = if result.done || result.truncated {
                report.episodes += 1;
                debug!(step, balance = result.info.balance, "episode finished, resetting");
                env.reset().0
            } else {
                result.observation
            };

            if step % self.config.rollout_len == 0 || step == total_steps {
                let [hold, buy, sell] = rollout_counts.percentages();
                info!(
                    step,
                    mean_reward = rollout_reward / rollout_counts.total() as f64,
                    actions = %rollout_counts,
                    hold_pct = hold,
                    buy_pct = buy,
                    sell_pct = sell,
                    "rollout"
                );
                rollout_reward = 0.0;
                rollout_counts = ActionCounts::default();
            }
        }

        report.steps = total_steps;
        self.steps_trained += total_steps;
        info!(
            steps = report.steps,
            episodes = report.episodes,
            mean_reward = report.mean_reward(),
            "training finished"
        );
        Ok(report)
    }

    fn save(&self, path: &Path) -> Result<(), PipsentryError> {
        let model = QTableModel {
            version: MODEL_VERSION,
            config: self.config.clone(),
            steps_trained: self.steps_trained,
            q_values: self.q_values.clone(),
        };
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &model).map_err(|e| PipsentryError::ModelFormat {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn load(&mut self, path: &Path) -> Result<(), PipsentryError> {
        if !path.is_file() {
            return Err(PipsentryError::ModelNotFound {
                path: path.display().to_string(),
            });
        }
        let format_error = |reason: String| PipsentryError::ModelFormat {
            path: path.display().to_string(),
            reason,
        };
        let reader = BufReader::new(File::open(path)?);
        let model: QTableModel =
            serde_json::from_reader(reader).map_err(|e| format_error(e.to_string()))?;
        if model.version != MODEL_VERSION {
            return Err(format_error(format!("unsupported version {}", model.version)));
        }
        if model.q_values.len() != STATE_COUNT {
            return Err(format_error(format!(
                "expected {} states, found {}",
                STATE_COUNT,
                model.q_values.len()
            )));
        }
        model.config.validate()?;

        self.rng = StdRng::seed_from_u64(model.config.seed);
        self.config = model.config;
        self.q_values = model.q_values;
        self.steps_trained = model.steps_trained;
        info!(path = %path.display(), steps_trained = self.steps_trained, "model loaded");
        Ok(())
    }
}
