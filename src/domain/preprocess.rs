//! Turns raw OHLC rows into enriched bars.
//!
//! Indicators: SMA(20), SMA(50), RSI(14), MACD(12,26,9) line and signal, ATR(14).
//! Rows where any indicator is still warming up are dropped, so the first
//! surviving bar is the 50th raw row.

use tracing::debug;

use super::error::PipsentryError;
use super::indicator::macd::{DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW};
use super::indicator::{
    IndicatorSeries, IndicatorValue, calculate_atr, calculate_macd, calculate_rsi, calculate_sma,
};
use super::market_data::Bar;
use super::ohlcv::OhlcBar;

pub const SMA_FAST_PERIOD: usize = 20;
pub const SMA_SLOW_PERIOD: usize = 50;
pub const RSI_PERIOD: usize = 14;
pub const ATR_PERIOD: usize = 14;

/// Raw rows consumed before the first enriched bar appears.
pub fn warmup_rows() -> usize {
    let macd = DEFAULT_SLOW - 1 + DEFAULT_SIGNAL - 1;
    (SMA_SLOW_PERIOD - 1)
        .max(SMA_FAST_PERIOD - 1)
        .max(RSI_PERIOD)
        .max(ATR_PERIOD)
        .max(macd)
}

fn valid_at(series: &IndicatorSeries, i: usize) -> Option<f64> {
    series
        .values
        .get(i)
        .filter(|p| p.valid)
        .map(|p| p.value.primary())
}

pub fn prepare_bars(raw: &[OhlcBar]) -> Result<Vec<Bar>, PipsentryError> {
    if raw.is_empty() {
        return Err(PipsentryError::DataContract {
            reason: "no OHLC rows to preprocess".into(),
        });
    }

    let sma20 = calculate_sma(raw, SMA_FAST_PERIOD);
    let sma50 = calculate_sma(raw, SMA_SLOW_PERIOD);
    let rsi = calculate_rsi(raw, RSI_PERIOD);
    let macd = calculate_macd(raw, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
    let atr = calculate_atr(raw, ATR_PERIOD);

    let mut bars = Vec::with_capacity(raw.len().saturating_sub(warmup_rows()));
    for (i, row) in raw.iter().enumerate() {
        let macd_point = macd.values.get(i).filter(|p| p.valid);
        let (Some(sma20), Some(sma50), Some(rsi), Some(atr), Some(macd_point)) = (
            valid_at(&sma20, i),
            valid_at(&sma50, i),
            valid_at(&rsi, i),
            valid_at(&atr, i),
            macd_point,
        ) else {
            continue;
        };
        let IndicatorValue::Macd { line, signal, .. } = macd_point.value else {
            continue;
        };
        bars.push(Bar {
            timestamp: row.timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            sma20,
            sma50,
            rsi,
            macd: line,
            signal,
            atr,
        });
    }

    debug!(
        raw = raw.len(),
        enriched = bars.len(),
        "indicator warmup rows dropped"
    );

    if bars.is_empty() {
        return Err(PipsentryError::DataContract {
            reason: format!(
                "{} rows are not enough to warm up indicators (need more than {})",
                raw.len(),
                warmup_rows()
            ),
        });
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_bars::flat_bars;

    fn wave(n: usize) -> Vec<OhlcBar> {
        let closes: Vec<f64> = (0..n)
            .map(|i| 1.1 + (i as f64 * 0.3).sin() * 0.005)
            .collect();
        let mut bars = flat_bars(&closes);
        for bar in &mut bars {
            bar.high = bar.close + 0.0005;
            bar.low = bar.close - 0.0005;
        }
        bars
    }

    #[test]
    fn warmup_is_sma50() {
        assert_eq!(warmup_rows(), 49);
    }

    #[test]
    fn empty_input_is_a_contract_error() {
        let err = prepare_bars(&[]).unwrap_err();
        assert!(matches!(err, PipsentryError::DataContract { .. }));
    }

    #[test]
    fn too_few_rows_fail() {
        let err = prepare_bars(&wave(40)).unwrap_err();
        assert!(matches!(err, PipsentryError::DataContract { .. }));
    }

    #[test]
    fn drops_warmup_rows() {
        let raw = wave(120);
        let bars = prepare_bars(&raw).unwrap();
        assert_eq!(bars.len(), 120 - 49);
        assert_eq!(bars[0].timestamp, raw[49].timestamp);
        assert_eq!(bars.last().unwrap().timestamp, raw[119].timestamp);
    }

    #[test]
    fn enriched_fields_are_sane() {
        let bars = prepare_bars(&wave(120)).unwrap();
        for bar in &bars {
            assert!((0.0..=100.0).contains(&bar.rsi));
            assert!(bar.atr > 0.0);
            assert!(bar.sma20 > 1.0 && bar.sma50 > 1.0);
            assert!(bar.macd.is_finite() && bar.signal.is_finite());
        }
    }

    #[test]
    fn constant_prices_give_flat_indicators() {
        let bars = prepare_bars(&flat_bars(&[1.2; 60])).unwrap();
        assert_eq!(bars.len(), 11);
        assert!((bars[0].sma20 - 1.2).abs() < 1e-12);
        assert!(bars[0].macd.abs() < 1e-12);
        assert_eq!(bars[0].atr, 0.0);
    }

    #[test]
    fn opening_bar_range_does_not_leak_into_atr() {
        let mut raw = flat_bars(&[1.1; 60]);
        for bar in &mut raw {
            bar.high = 1.101;
            bar.low = 1.099;
        }
        raw[0].high = 1.2;
        raw[0].low = 1.0;

        let bars = prepare_bars(&raw).unwrap();
        assert!((bars[0].atr - 0.002).abs() < 1e-12);
    }
}
