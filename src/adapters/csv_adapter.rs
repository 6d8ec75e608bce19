//! CSV price cache.
//!
//! One file per (symbol, start, end) request, named
//! `{symbol}_{start}_{end}.csv` with columns `date,open,high,low,close,volume`.

use crate::domain::error::RunnerError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const HEADER: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

pub struct CsvCache {
    base_path: PathBuf,
}

fn parse_field(record: &csv::StringRecord, index: usize, path: &Path) -> Result<f64, RunnerError> {
    let raw = record.get(index).ok_or_else(|| {
        RunnerError::data_source(format!(
            "{}: missing {} column",
            path.display(),
            HEADER[index]
        ))
    })?;
    raw.trim().parse().map_err(|e| {
        RunnerError::data_source(format!(
            "{}: invalid {} value '{}': {}",
            path.display(),
            HEADER[index],
            raw,
            e
        ))
    })
}

impl CsvCache {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn csv_path(&self, symbol: &str, start_date: NaiveDate, end_date: NaiveDate) -> PathBuf {
        self.base_path.join(format!(
            "{}_{}_{}.csv",
            symbol,
            start_date.format("%Y-%m-%d"),
            end_date.format("%Y-%m-%d")
        ))
    }

    pub fn contains(&self, symbol: &str, start_date: NaiveDate, end_date: NaiveDate) -> bool {
        self.csv_path(symbol, start_date, end_date).is_file()
    }

    /// `Ok(None)` when no cache file exists for the request.
    pub fn read(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Option<Vec<Bar>>, RunnerError> {
        let path = self.csv_path(symbol, start_date, end_date);
        if !path.is_file() {
            return Ok(None);
        }
        debug!(symbol, path = %path.display(), "reading cached bars");

        let mut rdr = csv::Reader::from_path(&path).map_err(|e| {
            RunnerError::data_source(format!("failed to read {}: {}", path.display(), e))
        })?;
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| {
                RunnerError::data_source(format!("{}: CSV parse error: {}", path.display(), e))
            })?;

            let date_str = record.get(0).ok_or_else(|| {
                RunnerError::data_source(format!("{}: missing date column", path.display()))
            })?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").map_err(|e| {
                RunnerError::data_source(format!(
                    "{}: invalid date '{}': {}",
                    path.display(),
                    date_str,
                    e
                ))
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            bars.push(Bar {
                symbol: symbol.to_string(),
                date,
                open: parse_field(&record, 1, &path)?,
                high: parse_field(&record, 2, &path)?,
                low: parse_field(&record, 3, &path)?,
                close: parse_field(&record, 4, &path)?,
                volume: parse_field(&record, 5, &path)?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(Some(bars))
    }

    /// Write `bars` to the cache file for the request, creating the cache
    /// directory if needed. An existing file is replaced.
    pub fn write(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        bars: &[Bar],
    ) -> Result<PathBuf, RunnerError> {
        fs::create_dir_all(&self.base_path)?;
        let path = self.csv_path(symbol, start_date, end_date);

        let to_err = |e: csv::Error| {
            RunnerError::data_source(format!("failed to write {}: {}", path.display(), e))
        };
        let mut writer = csv::Writer::from_path(&path).map_err(to_err)?;
        writer.write_record(HEADER).map_err(to_err)?;
        for bar in bars {
            writer
                .write_record([
                    bar.date.format("%Y-%m-%d").to_string(),
                    bar.open.to_string(),
                    bar.high.to_string(),
                    bar.low.to_string(),
                    bar.close.to_string(),
                    bar.volume.to_string(),
                ])
                .map_err(to_err)?;
        }
        writer.flush()?;

        debug!(symbol, bars = bars.len(), path = %path.display(), "cached bars");
        Ok(path)
    }

    /// Symbols with at least one cache file, sorted. A missing cache
    /// directory lists nothing.
    pub fn list_cached(&self) -> Result<Vec<String>, RunnerError> {
        if !self.base_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut symbols = BTreeSet::new();
        for entry in fs::read_dir(&self.base_path)? {
            let name = entry?.file_name();
            let name = name.to_string_lossy();
            let Some(stem) = name.strip_suffix(".csv") else {
                continue;
            };
            // {symbol}_{start}_{end}; symbols may themselves contain '_'
            let mut parts = stem.rsplitn(3, '_');
            let (Some(end), Some(start), Some(symbol)) = (parts.next(), parts.next(), parts.next())
            else {
                continue;
            };
            let dates_ok = [start, end]
                .iter()
                .all(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").is_ok());
            if dates_ok && !symbol.is_empty() {
                symbols.insert(symbol.to_string());
            }
        }
        Ok(symbols.into_iter().collect())
    }
}

impl DataPort for CsvCache {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, RunnerError> {
        match self.read(symbol, start_date, end_date)? {
            Some(bars) if !bars.is_empty() => Ok(bars),
            _ => Err(RunnerError::NoData {
                symbol: symbol.to_string(),
                start: start_date.to_string(),
                end: end_date.to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, RunnerError> {
        self.list_cached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup_test_data() -> (TempDir, CsvCache) {
        let dir = TempDir::new().unwrap();
        let cache = CsvCache::new(dir.path());

        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n";

        fs::write(dir.path().join("BHP_2024-01-15_2024-01-17.csv"), csv_content).unwrap();
        fs::write(
            dir.path().join("BRK_B_2024-01-01_2024-12-31.csv"),
            "date,open,high,low,close,volume\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "not a cache file").unwrap();
        fs::write(dir.path().join("broken.csv"), "").unwrap();

        (dir, cache)
    }

    #[test]
    fn path_uses_symbol_and_range() {
        let cache = CsvCache::new("data");
        let path = cache.csv_path("AAPL", date(2020, 1, 1), date(2025, 3, 25));
        assert_eq!(path, PathBuf::from("data/AAPL_2020-01-01_2025-03-25.csv"));
    }

    #[test]
    fn read_returns_sorted_bars() {
        let (_dir, cache) = setup_test_data();
        let bars = cache
            .read("BHP", date(2024, 1, 15), date(2024, 1, 17))
            .unwrap()
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].date, date(2024, 1, 15));
        assert_eq!(bars[0].symbol, "BHP");
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.0);
        assert_eq!(bars[2].date, date(2024, 1, 17));
    }

    #[test]
    fn read_missing_file_is_none() {
        let (_dir, cache) = setup_test_data();
        assert!(cache.read("XYZ", date(2024, 1, 1), date(2024, 1, 31)).unwrap().is_none());
        assert!(!cache.contains("XYZ", date(2024, 1, 1), date(2024, 1, 31)));
    }

    #[test]
    fn fetch_missing_or_empty_is_no_data() {
        let (_dir, cache) = setup_test_data();
        let err = cache.fetch_bars("XYZ", date(2024, 1, 1), date(2024, 1, 31)).unwrap_err();
        assert!(matches!(err, RunnerError::NoData { .. }));

        let err = cache
            .fetch_bars("BRK_B", date(2024, 1, 1), date(2024, 12, 31))
            .unwrap_err();
        assert!(matches!(err, RunnerError::NoData { .. }));
    }

    #[test]
    fn invalid_value_is_data_source_error() {
        let dir = TempDir::new().unwrap();
        let cache = CsvCache::new(dir.path());
        fs::write(
            cache.csv_path("BAD", date(2024, 1, 1), date(2024, 1, 31)),
            "date,open,high,low,close,volume\n2024-01-02,abc,1,1,1,1\n",
        )
        .unwrap();
        let err = cache.read("BAD", date(2024, 1, 1), date(2024, 1, 31)).unwrap_err();
        assert!(matches!(err, RunnerError::DataSource { .. }));
        assert!(err.to_string().contains("open"));
    }

    #[test]
    fn write_then_read() {
        let dir = TempDir::new().unwrap();
        let cache = CsvCache::new(dir.path().join("nested"));
        let bars = vec![Bar {
            symbol: "MSFT".into(),
            date: date(2024, 3, 1),
            open: 400.5,
            high: 410.0,
            low: 399.25,
            close: 405.75,
            volume: 1_234_567.0,
        }];

        let path = cache.write("MSFT", date(2024, 3, 1), date(2024, 3, 31), &bars).unwrap();
        assert!(path.is_file());
        let read = cache.read("MSFT", date(2024, 3, 1), date(2024, 3, 31)).unwrap().unwrap();
        assert_eq!(read, bars);
    }

    #[test]
    fn list_cached_parses_file_names() {
        let (_dir, cache) = setup_test_data();
        assert_eq!(cache.list_symbols().unwrap(), vec!["BHP", "BRK_B"]);
    }

    #[test]
    fn list_cached_without_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = CsvCache::new(dir.path().join("missing"));
        assert!(cache.list_cached().unwrap().is_empty());
    }
}
