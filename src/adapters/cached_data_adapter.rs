//! Read-through cache in front of a remote data source.

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::adapters::csv_adapter::CsvCache;
use crate::domain::error::RunnerError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;

/// Serves bars from the CSV cache, falling back to `source` on a miss and
/// caching what it returns. Without a source a miss is `NoData`.
pub struct CachedDataAdapter<'a> {
    cache: CsvCache,
    source: Option<&'a dyn DataPort>,
}

impl<'a> CachedDataAdapter<'a> {
    pub fn new(cache: CsvCache, source: Option<&'a dyn DataPort>) -> Self {
        Self { cache, source }
    }

    pub fn cache(&self) -> &CsvCache {
        &self.cache
    }
}

impl DataPort for CachedDataAdapter<'_> {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, RunnerError> {
        if let Some(bars) = self.cache.read(symbol, start_date, end_date)? {
            info!(symbol, bars = bars.len(), "loaded cached data");
            if bars.is_empty() {
                return Err(RunnerError::NoData {
                    symbol: symbol.to_string(),
                    start: start_date.to_string(),
                    end: end_date.to_string(),
                });
            }
            return Ok(bars);
        }

        let Some(source) = self.source else {
            return Err(RunnerError::NoData {
                symbol: symbol.to_string(),
                start: start_date.to_string(),
                end: end_date.to_string(),
            });
        };

        let bars = source.fetch_bars(symbol, start_date, end_date)?;
        if let Err(e) = self.cache.write(symbol, start_date, end_date, &bars) {
            warn!(symbol, "failed to cache downloaded data: {e}");
        }
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RunnerError> {
        self.cache.list_cached()
    }
}
