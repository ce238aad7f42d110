//! Reward shaping for closed trades and open positions.
//!
//! Close reward tiers (profit in account currency, scaled by initial balance):
//! - profit > 30: x100
//! - 0 < profit <= 30: x60
//! - profit <= 0: x80
//! A winning close by a Sell action is boosted x1.2, whatever direction it closed.
//!
//! Open positions earn x5 of unrealized P&L once it exceeds 15.

use super::action::Action;

/// Flat reward on a daily-loss or drawdown breach. Replaces any shaping for that step.
pub const RISK_PENALTY: f64 = -20.0;

const BIG_WIN_THRESHOLD: f64 = 30.0;
const BIG_WIN_SCALE: f64 = 100.0;
const SMALL_WIN_SCALE: f64 = 60.0;
const LOSS_SCALE: f64 = 80.0;
const SELL_WIN_MULTIPLIER: f64 = 1.2;

const UNREALIZED_THRESHOLD: f64 = 15.0;
const UNREALIZED_SCALE: f64 = 5.0;

pub fn close_reward(profit: f64, closing_action: Action, initial_balance: f64) -> f64 {
    let ratio = profit / initial_balance;
    let mut reward = if profit > BIG_WIN_THRESHOLD {
        ratio * BIG_WIN_SCALE
    } else if profit > 0.0 {
        ratio * SMALL_WIN_SCALE
    } else {
        ratio * LOSS_SCALE
    };
    if closing_action == Action::Sell && profit > 0.0 {
        reward *= SELL_WIN_MULTIPLIER;
    }
    reward
}

pub fn unrealized_bonus(unrealized: f64, initial_balance: f64) -> f64 {
    if unrealized > UNREALIZED_THRESHOLD {
        unrealized / initial_balance * UNREALIZED_SCALE
    } else {
        0.0
    }
}
