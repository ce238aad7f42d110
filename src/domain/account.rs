//! Account state and equity tracking.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub timestamp: NaiveDateTime,
    pub equity: f64,
}

/// Realized balance, marked-to-market equity and the daily P&L counter.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountState {
    pub balance: f64,
    pub equity: f64,
    pub max_equity: f64,
    pub daily_pnl: f64,
}

impl AccountState {
    pub fn new(initial_balance: f64) -> Self {
        AccountState {
            balance: initial_balance,
            equity: initial_balance,
            max_equity: initial_balance,
            daily_pnl: 0.0,
        }
    }

    /// Book a closed trade's profit into balance and the daily counter.
    pub fn realize(&mut self, profit: f64) {
        self.balance += profit;
        self.equity = self.balance;
        self.daily_pnl += profit;
    }

    /// Recompute equity from the open position's unrealized P&L and lift the peak.
    pub fn mark_to_market(&mut self, unrealized: f64) {
        self.equity = self.balance + unrealized;
        self.max_equity = self.max_equity.max(self.equity);
    }

    /// Fractional decline of equity from its running peak.
    pub fn drawdown(&self) -> f64 {
        (self.max_equity - self.equity) / self.max_equity
    }

    /// Today's realized loss as a fraction of the starting balance (positive = loss).
    pub fn daily_loss(&self, initial_balance: f64) -> f64 {
        -self.daily_pnl / initial_balance
    }

    /// Hand back the finished day's P&L and start a new day at zero.
    pub fn take_daily_pnl(&mut self) -> f64 {
        std::mem::take(&mut self.daily_pnl)
    }
}
