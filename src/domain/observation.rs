//! Observation encoding shared by the environment and every agent.
//!
//! Layout (index: field):
//! 0-3: open/high/low/close as `(x - 1.0) / 0.2`
//! 4: rsi / 100
//! 5-6: macd / 0.01, signal / 0.01
//! 7: atr / 0.001
//! 8: balance / initial_balance
//! 9: (direction_sign + 1) / 2, i.e. short=0, flat=0.5, long=1
//!
//! Agents trained against this layout must be evaluated against it too.

use super::market_data::Bar;
use super::position::Direction;

pub const OBSERVATION_LEN: usize = 10;

const PRICE_CENTER: f64 = 1.0;
const PRICE_SCALE: f64 = 0.2;
const RSI_SCALE: f64 = 100.0;
const MACD_SCALE: f64 = 0.01;
const ATR_SCALE: f64 = 0.001;

pub const RSI_INDEX: usize = 4;
pub const MACD_INDEX: usize = 5;
pub const SIGNAL_INDEX: usize = 6;
pub const ATR_INDEX: usize = 7;
pub const BALANCE_INDEX: usize = 8;
pub const DIRECTION_INDEX: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation(pub [f64; OBSERVATION_LEN]);

impl Observation {
    pub fn encode(bar: &Bar, balance_ratio: f64, direction: Direction) -> Self {
        let norm = |x: f64| (x - PRICE_CENTER) / PRICE_SCALE;
        Observation([
            norm(bar.open),
            norm(bar.high),
            norm(bar.low),
            norm(bar.close),
            bar.rsi / RSI_SCALE,
            bar.macd / MACD_SCALE,
            bar.signal / MACD_SCALE,
            bar.atr / ATR_SCALE,
            balance_ratio,
            (direction.sign() + 1.0) / 2.0,
        ])
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, index: usize) -> f64 {
        self.0[index]
    }

    /// Undo the price normalization of the close field.
    pub fn close_price(&self) -> f64 {
        self.0[3] * PRICE_SCALE + PRICE_CENTER
    }

    pub fn direction(&self) -> Direction {
        let v = self.0[DIRECTION_INDEX];
        if v < 0.25 {
            Direction::Short
        } else if v > 0.75 {
            Direction::Long
        } else {
            Direction::Flat
        }
    }
}
