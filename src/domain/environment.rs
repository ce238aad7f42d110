//! Forex trading environment: a step/reset state machine over a bar series.
//!
//! Each `step` runs, in order:
//! 1. resolve the action against the position (open, or close and realize)
//! 2. advance the cursor
//! 3. mark equity to the next bar's close
//! 4. lift the equity peak
//! 5. check daily loss and drawdown limits (breach: done, reward = RISK_PENALTY)
//! 6. check data exhaustion (done, no penalty)
//! 7. add unrealized shaping for a still-open position, unless a limit was breached

use tracing::{debug, warn};

use super::account::AccountState;
use super::action::Action;
use super::error::PipsentryError;
use super::market_data::{Bar, MarketData};
use super::observation::Observation;
use super::position::{Direction, Position};
use super::reward::{RISK_PENALTY, close_reward, unrealized_bonus};

#[derive(Debug, Clone, PartialEq)]
pub struct EnvConfig {
    pub initial_balance: f64,
    pub daily_loss_limit: f64,
    pub max_drawdown: f64,
    /// Spread in pips charged on every entry.
    pub spread: f64,
}

impl Default for EnvConfig {
    fn default() -> Self {
        EnvConfig {
            initial_balance: 10_000.0,
            daily_loss_limit: 0.05,
            max_drawdown: 0.10,
            spread: 1.0,
        }
    }
}

impl EnvConfig {
    pub fn new(
        initial_balance: f64,
        daily_loss_limit: f64,
        max_drawdown: f64,
        spread: f64,
    ) -> Result<Self, PipsentryError> {
        let config = EnvConfig {
            initial_balance,
            daily_loss_limit,
            max_drawdown,
            spread,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipsentryError> {
        if !self.initial_balance.is_finite() || self.initial_balance <= 0.0 {
            return Err(PipsentryError::config_invalid(
                "account",
                "initial_balance",
                "initial_balance must be positive",
            ));
        }
        if !(self.daily_loss_limit > 0.0 && self.daily_loss_limit <= 1.0) {
            return Err(PipsentryError::config_invalid(
                "challenge",
                "daily_loss_limit",
                "daily_loss_limit must be in (0, 1]",
            ));
        }
        if !(self.max_drawdown > 0.0 && self.max_drawdown <= 1.0) {
            return Err(PipsentryError::config_invalid(
                "challenge",
                "max_drawdown",
                "max_drawdown must be in (0, 1]",
            ));
        }
        if !self.spread.is_finite() || self.spread < 0.0 {
            return Err(PipsentryError::config_invalid(
                "account",
                "spread",
                "spread must be non-negative",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvStatus {
    /// Constructed, waiting for `reset`.
    Ready,
    Running,
    /// Terminated; only `reset` is allowed.
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepInfo {
    pub balance: f64,
    pub equity: f64,
    pub drawdown: f64,
    /// Set when this step ended the episode on a daily-loss or drawdown limit.
    pub risk_breached: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f64,
    pub done: bool,
    pub truncated: bool,
    pub info: StepInfo,
}

/// Read-only view of the bar under the cursor, handed to every agent.
#[derive(Debug, Clone, Copy)]
pub struct MarketContext<'a> {
    pub bar: &'a Bar,
    pub direction: Direction,
    pub step: usize,
}

#[derive(Debug, Clone)]
pub struct TradingEnv {
    data: MarketData,
    config: EnvConfig,
    account: AccountState,
    position: Position,
    cursor: usize,
    status: EnvStatus,
}

impl TradingEnv {
    pub fn new(data: MarketData, config: EnvConfig) -> Result<Self, PipsentryError> {
        config.validate()?;
        Ok(TradingEnv {
            account: AccountState::new(config.initial_balance),
            data,
            config,
            position: Position::Flat,
            cursor: 0,
            status: EnvStatus::Ready,
        })
    }

    pub fn reset(&mut self) -> (Observation, StepInfo) {
        self.account = AccountState::new(self.config.initial_balance);
        self.position = Position::Flat;
        self.cursor = 0;
        self.status = EnvStatus::Running;
        (self.observe(), self.info())
    }

    pub fn step(&mut self, action: Action) -> Result<StepResult, PipsentryError> {
        match self.status {
            EnvStatus::Ready => return Err(PipsentryError::EpisodeNotStarted),
            EnvStatus::Done => {
                return Err(PipsentryError::EpisodeFinished { step: self.cursor });
            }
            EnvStatus::Running => {}
        }

        let initial_balance = self.config.initial_balance;
        let current_price = self.data.bars()[self.cursor].close;
        let next_price = self
            .data
            .bar(self.cursor + 1)
            .map_or(current_price, |b| b.close);

        let mut reward = 0.0;
        match (action, self.position) {
            (Action::Hold, _) => {}
            (Action::Buy, Position::Flat) => {
                self.position = Position::open_long(current_price, self.config.spread);
            }
            (Action::Sell, Position::Flat) => {
                self.position = Position::open_short(current_price, self.config.spread);
            }
            (_, open) => {
                let profit = open.pnl_at(current_price);
                self.account.realize(profit);
                reward = close_reward(profit, action, initial_balance);
                self.position = Position::Flat;
                debug!(
                    step = self.cursor,
                    %action,
                    closed = %open.direction(),
                    profit,
                    reward,
                    "position closed"
                );
            }
        }

        self.cursor += 1;
        self.account.mark_to_market(self.position.pnl_at(next_price));

        let drawdown = self.account.drawdown();
        let daily_loss = self.account.daily_loss(initial_balance);
        let mut done = false;

        let breached =
            daily_loss > self.config.daily_loss_limit || drawdown > self.config.max_drawdown;
        if breached {
            done = true;
            reward = RISK_PENALTY;
            warn!(
                step = self.cursor,
                daily_loss,
                drawdown,
                equity = self.account.equity,
                "risk limit breached, terminating episode"
            );
        }

        if self.cursor >= self.data.len() - 1 {
            done = true;
        }

        if !breached && !self.position.is_flat() {
            let unrealized = self.position.pnl_at(next_price);
            reward += unrealized_bonus(unrealized, initial_balance);
            debug!(step = self.cursor, %action, unrealized, reward, "position open");
        }

        if done {
            self.status = EnvStatus::Done;
        }

        Ok(StepResult {
            observation: self.observe(),
            reward,
            done,
            truncated: false,
            info: StepInfo {
                balance: self.account.balance,
                equity: self.account.equity,
                drawdown,
                risk_breached: breached,
            },
        })
    }

    /// Close the books on the current day: returns its realized P&L and
    /// starts the next day's counter at zero.
    pub fn roll_over_day(&mut self) -> f64 {
        self.account.take_daily_pnl()
    }

    pub fn context(&self) -> MarketContext<'_> {
        MarketContext {
            bar: self.current_bar(),
            direction: self.position.direction(),
            step: self.cursor,
        }
    }

    pub fn current_bar(&self) -> &Bar {
        &self.data.bars()[self.cursor]
    }

    pub fn observe(&self) -> Observation {
        Observation::encode(
            self.current_bar(),
            self.account.balance / self.config.initial_balance,
            self.position.direction(),
        )
    }

    fn info(&self) -> StepInfo {
        StepInfo {
            balance: self.account.balance,
            equity: self.account.equity,
            drawdown: self.account.drawdown(),
            risk_breached: false,
        }
    }

    pub fn account(&self) -> &AccountState {
        &self.account
    }

    pub fn balance(&self) -> f64 {
        self.account.balance
    }

    pub fn equity(&self) -> f64 {
        self.account.equity
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn status(&self) -> EnvStatus {
        self.status
    }

    pub fn is_done(&self) -> bool {
        self.status == EnvStatus::Done
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn data(&self) -> &MarketData {
        &self.data
    }
}
