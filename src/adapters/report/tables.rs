//! Plain-text tables for the console: the backtest summary block and the
//! trade analysis table.

use crate::domain::backtest::BacktestResult;
use crate::domain::metrics::Metrics;
use crate::domain::position::{Direction, TradeRecord};

pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

pub fn format_summary(result: &BacktestResult, metrics: &Metrics) -> String {
    let counts = &metrics.action_counts;
    let [hold_pct, buy_pct, sell_pct] = counts.percentages();
    let mut out = String::new();
    out.push_str(&format!("Profit: {:.2}%\n", metrics.profit_pct));
    out.push_str(&format!("Max Daily Loss: {:.2}%\n", metrics.max_daily_loss_pct));
    out.push_str(&format!("Trading Days: {}\n", metrics.trading_days));
    out.push_str(&format!("Total Trades: {}\n", metrics.total_trades));
    out.push_str(&format!("Avg Trade Profit: {:.2}\n", metrics.avg_trade_profit));
    out.push_str(&format!(
        "Win Rate: {:.1}% ({} won / {} lost)\n",
        metrics.win_rate * 100.0,
        metrics.trades_won,
        metrics.trades_lost
    ));
    out.push_str(&format!("Max Drawdown: {:.2}%\n", metrics.max_drawdown * 100.0));
    out.push_str(&format!(
        "Action Counts: Hold {} ({:.1}%), Buy {} ({:.1}%), Sell {} ({:.1}%) (Total: {})\n",
        counts.hold,
        hold_pct,
        counts.buy,
        buy_pct,
        counts.sell,
        sell_pct,
        result.steps
    ));
    out.push_str(&format!("Final Balance: {:.2}\n", result.final_balance));
    out.push_str(&format!("Success: {}\n", metrics.success()));
    out
}

fn trade_type_label(direction: Direction) -> &'static str {
    match direction {
        Direction::Long => "Long",
        Direction::Short => "Short",
        Direction::Flat => "Flat",
    }
}

pub fn format_trade_table(trades: &[TradeRecord]) -> String {
    let mut out = String::from("Trade Analysis:\n");
    out.push_str(&format!(
        "{:<6} {:<6} {:<20} {:<11} {:<20} {:<12} {:<7} {:<7} {:<9}\n",
        "Trade",
        "Type",
        "Open Time",
        "Open Price",
        "Close Time",
        "Close Price",
        "Spread",
        "Profit",
        "Balance"
    ));
    out.push_str(&"-".repeat(105));
    out.push('\n');

    if trades.is_empty() {
        out.push_str("No trades executed.\n");
        return out;
    }

    for t in trades {
        out.push_str(&format!(
            "{:<6} {:<6} {:<20} {:<11.5} {:<20} {:<12.5} {:<7.2} {:<7.2} {:<9.2}\n",
            t.trade_number,
            trade_type_label(t.trade_type),
            t.open_time.format(TIME_FORMAT).to_string(),
            t.open_price,
            t.close_time.format(TIME_FORMAT).to_string(),
            t.close_price,
            t.spread,
            t.profit,
            t.balance
        ));
    }
    out
}
