//! Episode driver: runs an agent against the environment and keeps the
//! trade log, daily P&L history and trading-day set the challenge is judged on.
//!
//! ChallengeConfig defines the pass criteria.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, info};

use super::account::EquityPoint;
use super::action::{Action, ActionCounts};
use super::environment::TradingEnv;
use super::error::PipsentryError;
use super::position::{Direction, PIP_SIZE, PIP_VALUE, TradeRecord};
use crate::ports::agent_port::Agent;

/// Steps between progress log lines (one trading day of hourly bars).
pub const PROGRESS_INTERVAL: usize = 24;

#[derive(Debug, Clone, PartialEq)]
pub struct ChallengeConfig {
    pub profit_target: f64,
    pub daily_loss_limit: f64,
    pub max_drawdown: f64,
    pub min_trading_days: usize,
}

impl Default for ChallengeConfig {
    fn default() -> Self {
        ChallengeConfig {
            profit_target: 0.08,
            daily_loss_limit: 0.05,
            max_drawdown: 0.10,
            min_trading_days: 5,
        }
    }
}

impl ChallengeConfig {
    pub fn validate(&self) -> Result<(), PipsentryError> {
        for (key, value) in [
            ("profit_target", self.profit_target),
            ("daily_loss_limit", self.daily_loss_limit),
            ("max_drawdown", self.max_drawdown),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PipsentryError::config_invalid(
                    "challenge",
                    key,
                    format!("{} must be in (0, 1], got {}", key, value),
                ));
            }
        }
        Ok(())
    }

    /// Profit target in percent of the initial balance.
    pub fn profit_target_pct(&self) -> f64 {
        self.profit_target * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The cursor reached the last bar.
    DataExhausted,
    /// The environment terminated on a daily-loss or drawdown breach before
    /// the last bar.
    RiskLimit,
    /// Profit target and minimum trading days were met before the data ran out.
    ChallengePassed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub timestamp: NaiveDateTime,
    pub close: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub trades: Vec<TradeRecord>,
    /// Realized P&L per completed day, oldest first.
    pub daily_pnl: Vec<f64>,
    pub trading_days: BTreeSet<NaiveDate>,
    pub action_counts: ActionCounts,
    pub equity_curve: Vec<EquityPoint>,
    /// Close prices of the whole replayed series, for charting.
    pub prices: Vec<PricePoint>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub final_equity: f64,
    pub steps: usize,
    pub stop_reason: StopReason,
}

impl BacktestResult {
    /// Realized profit in percent of the initial balance.
    pub fn profit_pct(&self) -> f64 {
        (self.final_balance - self.initial_balance) / self.initial_balance * 100.0
    }

    pub fn trading_day_count(&self) -> usize {
        self.trading_days.len()
    }
}

#[derive(Debug, Clone)]
struct PendingTrade {
    trade_type: Direction,
    open_time: NaiveDateTime,
    open_price: f64,
}

/// Replay the environment's series with `agent`, recording closed trades
/// and per-day P&L. Stops early once the challenge is passed.
pub fn run_backtest(
    env: &mut TradingEnv,
    agent: &mut dyn Agent,
    challenge: &ChallengeConfig,
    deterministic: bool,
) -> Result<BacktestResult, PipsentryError> {
    let initial_balance = env.config().initial_balance;
    let spread = env.config().spread;

    let (mut observation, mut step_info) = env.reset();
    let mut trades: Vec<TradeRecord> = Vec::new();
    let mut daily_pnl: Vec<f64> = Vec::new();
    let mut trading_days: BTreeSet<NaiveDate> = BTreeSet::new();
    let mut action_counts = ActionCounts::default();
    let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(env.data().len());
    let mut current_day: Option<NaiveDate> = None;
    let mut pending: Option<PendingTrade> = None;
    let mut stop_reason = StopReason::DataExhausted;

    info!(
        agent = agent.name(),
        bars = env.data().len(),
        initial_balance,
        deterministic,
        "backtest started"
    );

    loop {
        let action = agent.predict(&observation, &env.context(), deterministic)?;
        action_counts.record(action);

        let prev_balance = env.balance();
        let current_time = env.current_bar().timestamp;
        let current_close = env.current_bar().close;

        if pending.is_none() && env.position().is_flat() {
            pending = match action {
                Action::Buy => Some(PendingTrade {
                    trade_type: Direction::Long,
                    open_time: current_time,
                    open_price: current_close + spread * PIP_SIZE,
                }),
                Action::Sell => Some(PendingTrade {
                    trade_type: Direction::Short,
                    open_time: current_time,
                    open_price: current_close - spread * PIP_SIZE,
                }),
                Action::Hold => None,
            };
        }

        let result = env.step(action)?;
        observation = result.observation;
        step_info = result.info;
        let mut done = result.done;
        let day = env.current_bar().date();

        if action.is_trade() && env.position().is_flat() {
            let closed = pending.take().filter(|_| result.info.balance != prev_balance);
            if let Some(open) = closed {
                let profit = result.info.balance - prev_balance;
                trading_days.insert(day);
                let trade = TradeRecord {
                    trade_number: trades.len() + 1,
                    trade_type: open.trade_type,
                    open_time: open.open_time,
                    open_price: open.open_price,
                    close_time: current_time,
                    close_price: current_close,
                    spread: spread * PIP_VALUE,
                    profit,
                    balance: result.info.balance,
                };
                info!(
                    trade = trade.trade_number,
                    kind = %trade.trade_type,
                    %action,
                    profit,
                    open = trade.open_price,
                    close = trade.close_price,
                    "trade closed"
                );
                trades.push(trade);
            }
        }

        if current_day != Some(day) {
            let finished = env.roll_over_day();
            if current_day.is_some() {
                daily_pnl.push(finished);
            }
            current_day = Some(day);
        }

        equity_curve.push(EquityPoint {
            timestamp: env.current_bar().timestamp,
            equity: result.info.equity,
        });

        if result.info.risk_breached {
            stop_reason = StopReason::RiskLimit;
        }

        let profit_pct = (result.info.balance - initial_balance) / initial_balance * 100.0;
        if !result.info.risk_breached
            && profit_pct >= challenge.profit_target_pct()
            && trading_days.len() >= challenge.min_trading_days
        {
            done = true;
            stop_reason = StopReason::ChallengePassed;
            info!(
                step = env.cursor(),
                profit_pct,
                days = trading_days.len(),
                "challenge passed"
            );
        }

        if env.cursor() % PROGRESS_INTERVAL == 0 || done {
            info!(
                step = env.cursor(),
                day = daily_pnl.len() + 1,
                %action,
                balance = result.info.balance,
                equity = result.info.equity,
                trades = trades.len(),
                "progress"
            );
        }

        if done {
            break;
        }
    }

    if current_day.is_some() {
        daily_pnl.push(env.roll_over_day());
    }

    let prices = env
        .data()
        .bars()
        .iter()
        .map(|b| PricePoint {
            timestamp: b.timestamp,
            close: b.close,
        })
        .collect();

    Ok(BacktestResult {
        trades,
        daily_pnl,
        trading_days,
        action_counts,
        equity_curve,
        prices,
        initial_balance,
        final_balance: step_info.balance,
        final_equity: step_info.equity,
        steps: action_counts.total(),
        stop_reason,
    })
}

/// Totals of one plain evaluation episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeStats {
    pub steps: usize,
    pub total_reward: f64,
    pub final_balance: f64,
    pub final_equity: f64,
    pub action_counts: ActionCounts,
}

/// Run one episode from reset to termination without trade bookkeeping.
pub fn run_episode(
    env: &mut TradingEnv,
    agent: &mut dyn Agent,
    deterministic: bool,
) -> Result<EpisodeStats, PipsentryError> {
    let (mut observation, mut step_info) = env.reset();
    let mut total_reward = 0.0;
    let mut action_counts = ActionCounts::default();

    loop {
        let action = agent.predict(&observation, &env.context(), deterministic)?;
        action_counts.record(action);
        let result = env.step(action)?;
        total_reward += result.reward;
        observation = result.observation;
        step_info = result.info;
        debug!(
            step = env.cursor(),
            %action,
            reward = result.reward,
            balance = result.info.balance,
            equity = result.info.equity,
            "test step"
        );
        if result.done || result.truncated {
            break;
        }
    }

    info!(
        steps = action_counts.total(),
        total_reward,
        balance = step_info.balance,
        equity = step_info.equity,
        actions = %action_counts,
        "episode finished"
    );

    Ok(EpisodeStats {
        steps: action_counts.total(),
        total_reward,
        final_balance: step_info.balance,
        final_equity: step_info.equity,
        action_counts,
    })
}
