//! Market data access port.

use crate::domain::error::RunnerError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily bars for `symbol` between `start_date` and `end_date`, oldest
    /// first. An empty range is `RunnerError::NoData`.
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, RunnerError>;

    /// Symbols this source can serve without further downloads.
    fn list_symbols(&self) -> Result<Vec<String>, RunnerError>;
}
