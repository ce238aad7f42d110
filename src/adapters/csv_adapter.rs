//! CSV file price data adapter.
//!
//! Reads `<base>/<PAIR>_<TIMEFRAME>.csv` with a header row naming
//! timestamp, open, high, low, close and (optionally) volume columns.
//! Timestamps may be Dukascopy exports (`14.04.2025 09:00:00.000 GMT+0530`,
//! kept as local wall-clock time) or ISO-like `2025-04-14 09:00[:00]`.

use crate::domain::error::PipsentryError;
use crate::domain::ohlcv::OhlcBar;
use crate::ports::data_port::DataPort;
use chrono::{NaiveDate, NaiveDateTime};
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

const TIMESTAMP_FORMATS: [&str; 4] = [
    "%d.%m.%Y %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
];

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, pair: &str, timeframe: &str) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", pair, timeframe))
    }

    /// Every parseable row of the file, sorted oldest first with duplicate
    /// timestamps removed.
    fn read_all(&self, pair: &str, timeframe: &str) -> Result<Vec<OhlcBar>, PipsentryError> {
        let path = self.csv_path(pair, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| PipsentryError::DataSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| PipsentryError::DataSource {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?;
        let columns = Columns::locate(headers)?;

        let mut bars = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| PipsentryError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;
            match columns.parse(&record)? {
                Some(bar) => bars.push(bar),
                None => warn!(
                    row = line + 2,
                    file = %path.display(),
                    "skipping row with missing values"
                ),
            }
        }

        bars.sort_by_key(|b| b.timestamp);
        let before = bars.len();
        bars.dedup_by_key(|b| b.timestamp);
        if bars.len() != before {
            warn!(
                dropped = before - bars.len(),
                file = %path.display(),
                "dropped rows with duplicate timestamps"
            );
        }
        debug!(rows = bars.len(), file = %path.display(), "loaded price data");
        Ok(bars)
    }
}

struct Columns {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, PipsentryError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        let require = |names: &[&str]| {
            names
                .iter()
                .find_map(|n| find(n))
                .ok_or_else(|| PipsentryError::DataContract {
                    reason: format!("missing {} column", names[0]),
                })
        };
        Ok(Columns {
            timestamp: require(&["timestamp", "gmt time", "date", "datetime"])?,
            open: require(&["open"])?,
            high: require(&["high"])?,
            low: require(&["low"])?,
            close: require(&["close"])?,
            volume: find("volume"),
        })
    }

    /// `Ok(None)` for rows with an empty OHLC field.
    fn parse(&self, record: &csv::StringRecord) -> Result<Option<OhlcBar>, PipsentryError> {
        let field = |i: usize| record.get(i).filter(|s| !s.is_empty());
        let (Some(ts), Some(open), Some(high), Some(low), Some(close)) = (
            field(self.timestamp),
            field(self.open),
            field(self.high),
            field(self.low),
            field(self.close),
        ) else {
            return Ok(None);
        };

        let volume = match self.volume.and_then(field) {
            Some(v) => parse_price(v, "volume")?,
            None => 0.0,
        };

        Ok(Some(OhlcBar {
            timestamp: parse_timestamp(ts)?,
            open: parse_price(open, "open")?,
            high: parse_price(high, "high")?,
            low: parse_price(low, "low")?,
            close: parse_price(close, "close")?,
            volume,
        }))
    }
}

fn parse_price(value: &str, column: &str) -> Result<f64, PipsentryError> {
    value.parse().map_err(|e| PipsentryError::DataContract {
        reason: format!("invalid {} value {:?}: {}", column, value, e),
    })
}

/// Parse a feed timestamp. A trailing ` GMT+hhmm` zone tag is dropped.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, PipsentryError> {
    let local = value
        .split_once(" GMT")
        .map_or(value, |(wall, _)| wall)
        .trim();
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(local, fmt).ok())
        .ok_or_else(|| PipsentryError::DataContract {
            reason: format!("invalid timestamp {:?}", value),
        })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlc(
        &self,
        pair: &str,
        timeframe: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcBar>, PipsentryError> {
        let mut bars = self.read_all(pair, timeframe)?;
        bars.retain(|b| {
            let date = b.timestamp.date();
            date >= start_date && date <= end_date
        });
        Ok(bars)
    }

    fn get_data_range(
        &self,
        pair: &str,
        timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PipsentryError> {
        let bars = self.read_all(pair, timeframe)?;
        Ok(match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Some((
                first.timestamp.date(),
                last.timestamp.date(),
                bars.len(),
            )),
            _ => None,
        })
    }
}
