//! Single-position tracking and closed trade records.

use std::fmt;

use chrono::NaiveDateTime;

/// Price units per pip for a four-decimal pair.
pub const PIP_SIZE: f64 = 0.0001;
/// Converts a price delta into account-currency P&L (one standard lot).
pub const PIP_SCALE: f64 = 10_000.0;
/// Account-currency value of one pip of spread, used for trade records.
pub const PIP_VALUE: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Flat,
    Long,
    Short,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Flat => 0.0,
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Flat => "flat",
            Direction::Long => "long",
            Direction::Short => "short",
        };
        f.write_str(s)
    }
}

/// Current market exposure. The entry price only exists while a position is open.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Position {
    #[default]
    Flat,
    Long { entry_price: f64 },
    Short { entry_price: f64 },
}

impl Position {
    /// Long entry pays the spread above the close.
    pub fn open_long(close: f64, spread_pips: f64) -> Self {
        Position::Long {
            entry_price: close + spread_pips * PIP_SIZE,
        }
    }

    /// Short entry pays the spread below the close.
    pub fn open_short(close: f64, spread_pips: f64) -> Self {
        Position::Short {
            entry_price: close - spread_pips * PIP_SIZE,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Position::Flat => Direction::Flat,
            Position::Long { .. } => Direction::Long,
            Position::Short { .. } => Direction::Short,
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Flat)
    }

    pub fn entry_price(&self) -> Option<f64> {
        match *self {
            Position::Flat => None,
            Position::Long { entry_price } | Position::Short { entry_price } => Some(entry_price),
        }
    }

    /// Account-currency P&L of closing at `price`; zero when flat.
    pub fn pnl_at(&self, price: f64) -> f64 {
        match self.entry_price() {
            Some(entry) => (price - entry) * PIP_SCALE * self.direction().sign(),
            None => 0.0,
        }
    }
}

/// One closed round trip, as recorded by the episode driver.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub trade_number: usize,
    pub trade_type: Direction,
    pub open_time: NaiveDateTime,
    pub open_price: f64,
    pub close_time: NaiveDateTime,
    pub close_price: f64,
    pub spread: f64,
    pub profit: f64,
    pub balance: f64,
}
