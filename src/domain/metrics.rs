//! Backtest performance metrics and challenge evaluation.

use super::account::EquityPoint;
use super::action::ActionCounts;
use super::backtest::{BacktestResult, ChallengeConfig};

/// Which challenge criteria a run met.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChallengeOutcome {
    pub profit_target_met: bool,
    pub daily_loss_respected: bool,
    pub trading_days_met: bool,
}

impl ChallengeOutcome {
    pub fn passed(&self) -> bool {
        self.profit_target_met && self.daily_loss_respected && self.trading_days_met
    }
}

/// Success iff profit reached the target, the worst day stayed strictly above
/// the daily loss limit, and enough distinct days saw a closed trade.
pub fn evaluate_challenge(
    profit_pct: f64,
    max_daily_loss_pct: f64,
    trading_days: usize,
    challenge: &ChallengeConfig,
) -> ChallengeOutcome {
    ChallengeOutcome {
        profit_target_met: profit_pct >= challenge.profit_target * 100.0,
        daily_loss_respected: max_daily_loss_pct > -challenge.daily_loss_limit * 100.0,
        trading_days_met: trading_days >= challenge.min_trading_days,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub profit_pct: f64,
    /// Worst day's realized P&L in percent of the initial balance (0 without history).
    pub max_daily_loss_pct: f64,
    pub trading_days: usize,
    pub total_trades: usize,
    pub avg_trade_profit: f64,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// Peak-to-trough decline of the step equity curve, as a fraction.
    pub max_drawdown: f64,
    pub action_counts: ActionCounts,
    pub challenge: ChallengeOutcome,
}

impl Metrics {
    pub fn compute(result: &BacktestResult, challenge: &ChallengeConfig) -> Self {
        let initial = result.initial_balance;
        let profit_pct = result.profit_pct();

        let max_daily_loss_pct = result
            .daily_pnl
            .iter()
            .copied()
            .reduce(f64::min)
            .map_or(0.0, |worst| worst / initial * 100.0);

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;

        for trade in &result.trades {
            let profit = trade.profit;
            if profit > 0.0 {
                trades_won += 1;
                total_wins += profit;
                largest_win = largest_win.max(profit);
            } else if profit < 0.0 {
                trades_lost += 1;
                total_losses += profit.abs();
                largest_loss = largest_loss.max(profit.abs());
            }
        }

        let total_trades = result.trades.len();
        let avg_trade_profit = if total_trades > 0 {
            (total_wins - total_losses) / total_trades as f64
        } else {
            0.0
        };

        let win_rate = if total_trades > 0 {
            trades_won as f64 / total_trades as f64
        } else {
            0.0
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let trading_days = result.trading_day_count();

        Metrics {
            profit_pct,
            max_daily_loss_pct,
            trading_days,
            total_trades,
            avg_trade_profit,
            trades_won,
            trades_lost,
            win_rate,
            profit_factor,
            largest_win,
            largest_loss,
            max_drawdown: compute_drawdown(initial, &result.equity_curve),
            action_counts: result.action_counts,
            challenge: evaluate_challenge(profit_pct, max_daily_loss_pct, trading_days, challenge),
        }
    }

    pub fn success(&self) -> bool {
        self.challenge.passed()
    }
}

/// Max drawdown over an equity curve that starts at `initial`.
fn compute_drawdown(initial: f64, equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = initial;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - point.equity) / peak);
        }
    }

    max_dd
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{PricePoint, StopReason};
    use crate::domain::position::{Direction, TradeRecord};
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use std::collections::BTreeSet;

    fn ts(hour: i64) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            + Duration::hours(hour)
    }

    fn trade(n: usize, profit: f64) -> TradeRecord {
        TradeRecord {
            trade_number: n,
            trade_type: Direction::Long,
            open_time: ts(n as i64),
            open_price: 1.1,
            close_time: ts(n as i64 + 1),
            close_price: 1.1 + profit / 10_000.0,
            spread: 10.0,
            profit,
            balance: 10_000.0 + profit,
        }
    }

    fn make_result(trades: Vec<TradeRecord>, daily_pnl: Vec<f64>, days: usize) -> BacktestResult {
        let final_balance = 10_000.0 + trades.iter().map(|t| t.profit).sum::<f64>();
        let trading_days: BTreeSet<NaiveDate> = (0..days)
            .map(|d| NaiveDate::from_ymd_opt(2025, 1, 6).unwrap() + Duration::days(d as i64))
            .collect();
        BacktestResult {
            trades,
            daily_pnl,
            trading_days,
            action_counts: ActionCounts::default(),
            equity_curve: Vec::new(),
            prices: vec![PricePoint {
                timestamp: ts(0),
                close: 1.1,
            }],
            initial_balance: 10_000.0,
            final_balance,
            final_equity: final_balance,
            steps: 0,
            stop_reason: StopReason::DataExhausted,
        }
    }

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                timestamp: ts(i as i64),
                equity: v,
            })
            .collect()
    }

    #[test]
    fn empty_run() {
        let m = Metrics::compute(&make_result(vec![], vec![], 0), &ChallengeConfig::default());
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.profit_pct, 0.0);
        assert_eq!(m.max_daily_loss_pct, 0.0);
        assert_eq!(m.win_rate, 0.0);
        assert_eq!(m.profit_factor, 0.0);
        assert_eq!(m.avg_trade_profit, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert!(!m.success());
    }

    #[test]
    fn trade_statistics() {
        let trades = vec![trade(1, 100.0), trade(2, -50.0), trade(3, 200.0), trade(4, 0.0)];
        let m = Metrics::compute(
            &make_result(trades, vec![150.0, 100.0], 2),
            &ChallengeConfig::default(),
        );
        assert_eq!(m.total_trades, 4);
        assert_eq!(m.trades_won, 2);
        assert_eq!(m.trades_lost, 1);
        assert!((m.win_rate - 0.5).abs() < f64::EPSILON);
        assert!((m.profit_factor - 6.0).abs() < f64::EPSILON);
        assert!((m.avg_trade_profit - 62.5).abs() < f64::EPSILON);
        assert!((m.largest_win - 200.0).abs() < f64::EPSILON);
        assert!((m.largest_loss - 50.0).abs() < f64::EPSILON);
        assert!((m.profit_pct - 2.5).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_without_losses_is_infinite() {
        let m = Metrics::compute(
            &make_result(vec![trade(1, 10.0)], vec![10.0], 1),
            &ChallengeConfig::default(),
        );
        assert!(m.profit_factor.is_infinite());
    }

    #[test]
    fn max_daily_loss_is_worst_day() {
        let m = Metrics::compute(
            &make_result(vec![], vec![120.0, -300.0, -50.0], 0),
            &ChallengeConfig::default(),
        );
        assert!((m.max_daily_loss_pct - -3.0).abs() < 1e-9);
    }

    #[test]
    fn drawdown_from_initial_balance() {
        let curve = make_equity_curve(&[10_000.0, 11_000.0, 9_900.0, 10_500.0]);
        assert!((compute_drawdown(10_000.0, &curve) - 0.1).abs() < 1e-12);

        let losing = make_equity_curve(&[9_500.0, 9_800.0]);
        assert!((compute_drawdown(10_000.0, &losing) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn challenge_truth_table() {
        let c = ChallengeConfig::default();
        // profit, worst day, days -> passed
        let cases = [
            (8.01, -1.0, 5, true),
            (7.99, -1.0, 5, false),
            (8.01, -5.0, 5, false),
            (8.01, -4.99, 5, true),
            (8.01, 0.0, 4, false),
            (12.0, 0.0, 9, true),
            (-2.0, -6.0, 0, false),
        ];
        for (profit, worst, days, expected) in cases {
            let outcome = evaluate_challenge(profit, worst, days, &c);
            assert_eq!(
                outcome.passed(),
                expected,
                "profit={} worst={} days={}",
                profit,
                worst,
                days
            );
        }
    }

    #[test]
    fn outcome_flags_are_independent() {
        let outcome = evaluate_challenge(9.0, -6.0, 2, &ChallengeConfig::default());
        assert!(outcome.profit_target_met);
        assert!(!outcome.daily_loss_respected);
        assert!(!outcome.trading_days_met);
    }

    #[test]
    fn compute_reports_success() {
        let trades = vec![
            trade(1, 200.0),
            trade(2, 200.0),
            trade(3, 200.0),
            trade(4, 200.0),
            trade(5, 200.0),
        ];
        let m = Metrics::compute(
            &make_result(trades, vec![200.0; 5], 5),
            &ChallengeConfig::default(),
        );
        assert!((m.profit_pct - 10.0).abs() < 1e-9);
        assert!(m.success());
    }
}
