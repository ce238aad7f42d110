//! Enriched bars and the immutable series the environment steps over.

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use super::error::PipsentryError;

/// Minimum number of bars an episode needs: one to act on, one to mark to.
pub const MIN_BARS: usize = 2;

/// One hourly bar with the indicators every agent may consume.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub sma20: f64,
    pub sma50: f64,
    pub rsi: f64,
    pub macd: f64,
    pub signal: f64,
    pub atr: f64,
}

impl Bar {
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    fn fields(&self) -> [(&'static str, f64); 10] {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("sma20", self.sma20),
            ("sma50", self.sma50),
            ("rsi", self.rsi),
            ("macd", self.macd),
            ("signal", self.signal),
            ("atr", self.atr),
        ]
    }
}

/// Validated, oldest-first bar series. Clones share the same allocation.
#[derive(Debug, Clone)]
pub struct MarketData {
    bars: Arc<[Bar]>,
}

impl MarketData {
    pub fn new(bars: Vec<Bar>) -> Result<Self, PipsentryError> {
        if bars.len() < MIN_BARS {
            return Err(PipsentryError::DataContract {
                reason: format!("need at least {} bars, got {}", MIN_BARS, bars.len()),
            });
        }

        for (i, bar) in bars.iter().enumerate() {
            let fields = bar.fields();
            if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
                return Err(PipsentryError::DataContract {
                    reason: format!("bar {} ({}) has non-finite {}", i, bar.timestamp, name),
                });
            }
        }

        if let Some(w) = bars.windows(2).find(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(PipsentryError::DataContract {
                reason: format!(
                    "timestamps not strictly increasing: {} then {}",
                    w[0].timestamp, w[1].timestamp
                ),
            });
        }

        Ok(Self { bars: bars.into() })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bar(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn first_timestamp(&self) -> NaiveDateTime {
        self.bars[0].timestamp
    }

    pub fn last_timestamp(&self) -> NaiveDateTime {
        self.bars[self.bars.len() - 1].timestamp
    }

    /// Split into bars strictly before `at` and bars at or after it.
    /// Either side fails validation if it ends up too short.
    pub fn split_at(&self, at: NaiveDateTime) -> Result<(MarketData, MarketData), PipsentryError> {
        let idx = self.bars.partition_point(|b| b.timestamp < at);
        let before = MarketData::new(self.bars[..idx].to_vec())?;
        let after = MarketData::new(self.bars[idx..].to_vec())?;
        Ok((before, after))
    }
}
