//! Price data access port trait.

use crate::domain::error::PipsentryError;
use crate::domain::ohlcv::OhlcBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars for `pair`/`timeframe` whose date falls in `[start_date, end_date]`,
    /// oldest first.
    fn fetch_ohlc(
        &self,
        pair: &str,
        timeframe: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcBar>, PipsentryError>;

    /// First date, last date and row count, or `None` when there is no data.
    fn get_data_range(
        &self,
        pair: &str,
        timeframe: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PipsentryError>;
}
