//! File-based backtest reports: `trade_analysis.csv` and `price_trades.svg`.

pub mod chart_svg;
pub mod tables;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::domain::backtest::BacktestResult;
use crate::domain::error::PipsentryError;
use crate::domain::metrics::Metrics;
use crate::domain::position::TradeRecord;
use crate::ports::report_port::ReportPort;

pub const TRADE_LOG_FILE: &str = "trade_analysis.csv";
pub const PRICE_CHART_FILE: &str = "price_trades.svg";

const TRADE_LOG_HEADER: [&str; 9] = [
    "trade_number",
    "trade_type",
    "open_time",
    "open_price",
    "close_time",
    "close_price",
    "spread",
    "profit",
    "balance",
];

/// One trade log row, with prices at 5 decimals and money at 2.
#[derive(Debug, Serialize)]
struct TradeLogRow {
    trade_number: usize,
    trade_type: String,
    open_time: String,
    open_price: String,
    close_time: String,
    close_price: String,
    spread: String,
    profit: String,
    balance: String,
}

impl From<&TradeRecord> for TradeLogRow {
    fn from(t: &TradeRecord) -> Self {
        TradeLogRow {
            trade_number: t.trade_number,
            trade_type: t.trade_type.to_string(),
            open_time: t.open_time.format(tables::TIME_FORMAT).to_string(),
            open_price: format!("{:.5}", t.open_price),
            close_time: t.close_time.format(tables::TIME_FORMAT).to_string(),
            close_price: format!("{:.5}", t.close_price),
            spread: format!("{:.2}", t.spread),
            profit: format!("{:.2}", t.profit),
            balance: format!("{:.2}", t.balance),
        }
    }
}

pub struct FileReportAdapter {
    title: String,
}

impl FileReportAdapter {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }

    pub fn trade_log_path(output_dir: &Path) -> PathBuf {
        output_dir.join(TRADE_LOG_FILE)
    }

    pub fn price_chart_path(output_dir: &Path) -> PathBuf {
        output_dir.join(PRICE_CHART_FILE)
    }
}

fn csv_error(path: &Path, e: csv::Error) -> PipsentryError {
    let io = std::io::Error::from(e);
    PipsentryError::Io(std::io::Error::new(
        io.kind(),
        format!("failed to write {}: {}", path.display(), io),
    ))
}

/// Write the closed-trade log as CSV. A header row is written even when
/// there are no trades.
pub fn write_trade_log(path: &Path, trades: &[TradeRecord]) -> Result<(), PipsentryError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| csv_error(path, e))?;
    writer
        .write_record(TRADE_LOG_HEADER)
        .map_err(|e| csv_error(path, e))?;
    for trade in trades {
        writer
            .serialize(TradeLogRow::from(trade))
            .map_err(|e| csv_error(path, e))?;
    }
    writer.flush()?;
    Ok(())
}

impl ReportPort for FileReportAdapter {
    fn write(
        &self,
        result: &BacktestResult,
        metrics: &Metrics,
        output_dir: &Path,
    ) -> Result<(), PipsentryError> {
        fs::create_dir_all(output_dir)?;

        let trade_log = Self::trade_log_path(output_dir);
        write_trade_log(&trade_log, &result.trades)?;

        let chart = Self::price_chart_path(output_dir);
        let svg = chart_svg::generate_price_svg(&result.prices, &result.trades, &self.title);
        fs::write(&chart, svg)?;

        info!(
            dir = %output_dir.display(),
            trades = metrics.total_trades,
            "report written"
        );
        Ok(())
    }
}
