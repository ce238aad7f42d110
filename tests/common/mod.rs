#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use pipsentry::domain::action::Action;
use pipsentry::domain::environment::{EnvConfig, MarketContext, TradingEnv};
use pipsentry::domain::error::PipsentryError;
use pipsentry::domain::market_data::{Bar, MarketData};
pub use pipsentry::domain::ohlcv::OhlcBar;
use pipsentry::domain::observation::Observation;
use pipsentry::ports::agent_port::{Agent, TrainingReport};
use pipsentry::ports::data_port::DataPort;
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

/// Monday 2025-01-06 00:00.
pub fn start_time() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 1, 6)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A bar with neutral indicators (flat averages, RSI 50, no MACD).
pub fn make_bar(timestamp: NaiveDateTime, close: f64) -> Bar {
    Bar {
        timestamp,
        open: close,
        high: close + 0.0005,
        low: close - 0.0005,
        close,
        sma20: close,
        sma50: close,
        rsi: 50.0,
        macd: 0.0,
        signal: 0.0,
        atr: 0.001,
    }
}

pub fn bars_every(closes: &[f64], hours: i64) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| make_bar(start_time() + Duration::hours(i as i64 * hours), c))
        .collect()
}

pub fn hourly_market(closes: &[f64]) -> MarketData {
    MarketData::new(bars_every(closes, 1)).unwrap()
}

pub fn make_env(closes: &[f64]) -> TradingEnv {
    TradingEnv::new(hourly_market(closes), EnvConfig::default()).unwrap()
}

pub fn make_ohlc(timestamp: NaiveDateTime, close: f64) -> OhlcBar {
    OhlcBar {
        timestamp,
        open: close - 0.0002,
        high: close + 0.0008,
        low: close - 0.0008,
        close,
        volume: 1000.0,
    }
}

/// Hourly bars oscillating around 1.10 with a slow upward drift.
pub fn wave_ohlc(start: NaiveDateTime, count: usize) -> Vec<OhlcBar> {
    (0..count)
        .map(|i| {
            let x = i as f64;
            let close = 1.10 + 0.004 * (x / 6.0).sin() + 0.00002 * x;
            make_ohlc(start + Duration::hours(i as i64), close)
        })
        .collect()
}

/// Write bars as a Dukascopy-style CSV at `<dir>/<PAIR>_<TF>.csv`.
pub fn write_ohlc_csv(dir: &Path, pair: &str, timeframe: &str, bars: &[OhlcBar]) {
    let mut content = String::from("timestamp,open,high,low,close,volume\n");
    for b in bars {
        writeln!(
            content,
            "{} GMT+0000,{:.5},{:.5},{:.5},{:.5},{}",
            b.timestamp.format("%d.%m.%Y %H:%M:%S%.3f"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        )
        .unwrap();
    }
    fs::write(dir.join(format!("{}_{}.csv", pair, timeframe)), content).unwrap();
}

/// Plays a fixed action script, then holds.
pub struct ScriptedAgent {
    actions: Vec<Action>,
    next: usize,
}

impl ScriptedAgent {
    pub fn new(actions: Vec<Action>) -> Self {
        Self { actions, next: 0 }
    }
}

impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        "scripted"
    }

    fn predict(
        &mut self,
        _observation: &Observation,
        _context: &MarketContext<'_>,
        _deterministic: bool,
    ) -> Result<Action, PipsentryError> {
        let action = self.actions.get(self.next).copied().unwrap_or(Action::Hold);
        self.next += 1;
        Ok(action)
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

/// In-memory price feed keyed by `<PAIR>_<TF>`. Counts calls so tests can
/// check how often the source is read.
pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcBar>>,
    pub errors: HashMap<String, String>,
    pub fetch_calls: Cell<usize>,
    pub range_calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetch_calls: Cell::new(0),
            range_calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, pair: &str, timeframe: &str, bars: Vec<OhlcBar>) -> Self {
        self.data.insert(format!("{}_{}", pair, timeframe), bars);
        self
    }

    pub fn with_error(mut self, pair: &str, timeframe: &str, reason: &str) -> Self {
        self.errors
            .insert(format!("{}_{}", pair, timeframe), reason.to_string());
        self
    }

    fn lookup(&self, pair: &str, timeframe: &str) -> Result<Vec<OhlcBar>, PipsentryError> {
        let key = format!("{}_{}", pair, timeframe);
        if let Some(reason) = self.errors.get(&key) {
            return Err(PipsentryError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self.data.get(&key).cloned().unwrap_or_default())
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlc(
        &self,
        pair: &str,
        timeframe: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcBar>, PipsentryError> {
        self.fetch_calls.set(self.fetch_calls.get() + 1);
        let mut bars = self.lookup(pair, timeframe)?;
        bars.retain(|b| {
            let d = b.timestamp.date();
            d >= start_date && d <= end_date
        });
        Ok(bars)
    }

    fn get_data_range(
        &self,
        pair: &str,
        timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PipsentryError> {
        self.range_calls.set(self.range_calls.get() + 1);
        let bars = self.lookup(pair, timeframe)?;
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((
                first.timestamp.date(),
                last.timestamp.date(),
                bars.len(),
            ))),
            _ => Ok(None),
        }
    }
}
