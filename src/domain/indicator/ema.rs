//! Exponential Moving Average.
//!
//! k = 2/(n+1), seed with first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcBar;

pub fn calculate_ema(bars: &[OhlcBar], period: usize) -> IndicatorSeries {
    if period == 0 || bars.is_empty() {
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values: Vec::new(),
        };
    }

    let raw = ema_seeded_at(bars, period, period - 1);
    let values = bars
        .iter()
        .zip(raw)
        .enumerate()
        .map(|(i, (bar, ema))| IndicatorPoint {
            timestamp: bar.timestamp,
            valid: i + 1 >= period,
            value: IndicatorValue::Simple(ema),
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}

/// EMA whose SMA seed sits at `seed_index`, averaging the `period` closes
/// ending there. Earlier entries are 0.0; an out-of-range seed yields all zeros.
pub(crate) fn ema_seeded_at(bars: &[OhlcBar], period: usize, seed_index: usize) -> Vec<f64> {
    let mut values = vec![0.0; bars.len()];
    if period == 0 || seed_index + 1 < period || seed_index >= bars.len() {
        return values;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let window = &bars[seed_index + 1 - period..=seed_index];
    let mut ema = window.iter().map(|b| b.close).sum::<f64>() / period as f64;
    values[seed_index] = ema;
    for (value, bar) in values.iter_mut().zip(bars).skip(seed_index + 1) {
        ema = bar.close * k + ema * (1.0 - k);
        *value = ema;
    }
    values
}
