#![allow(dead_code)]

use chrono::NaiveDate;
use mabt::domain::engine::EngineConfig;
use mabt::domain::error::RunnerError;
pub use mabt::domain::ohlcv::Bar;
use mabt::domain::run_config::RunConfig;
use mabt::domain::strategy::CrossoverParams;
use mabt::ports::data_port::DataPort;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::PathBuf;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
    pub calls: Cell<usize>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            calls: Cell::new(0),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, RunnerError> {
        self.calls.set(self.calls.get() + 1);
        if let Some(reason) = self.errors.get(symbol) {
            return Err(RunnerError::data_source(reason.clone()));
        }
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(RunnerError::NoData {
                symbol: symbol.to_string(),
                start: start_date.to_string(),
                end: end_date.to_string(),
            }),
        }
    }

    fn list_symbols(&self) -> Result<Vec<String>, RunnerError> {
        let mut symbols: Vec<_> = self.data.keys().cloned().collect();
        symbols.sort();
        Ok(symbols)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(symbol: &str, date: NaiveDate, close: f64) -> Bar {
    Bar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high: close + 1.0,
        low: (close - 1.0).max(0.0),
        close,
        volume: 1000.0,
    }
}

/// One bar per calendar day from 2020-01-01, opening at the close.
pub fn bars_from_closes(symbol: &str, closes: &[f64]) -> Vec<Bar> {
    let start = date(2020, 1, 1);
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            make_bar(symbol, start + chrono::Duration::days(i as i64), close)
        })
        .collect()
}

/// 60 closes: 30 flat at 100, 15 rising by 2, 15 falling by 3. With fast=10
/// and slow=30 both averages are first defined (and equal) on index 29, the
/// golden cross lands on index 30 (bar 31) and the death cross on index 55.
pub fn crossover_closes() -> Vec<f64> {
    (0..60)
        .map(|i| match i {
            0..30 => 100.0,
            30..45 => 100.0 + (i - 29) as f64 * 2.0,
            _ => 130.0 - (i - 44) as f64 * 3.0,
        })
        .collect()
}

pub fn run_config(symbols: &[&str], fast: usize, slow: usize) -> RunConfig {
    RunConfig {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        start_date: date(2020, 1, 1),
        end_date: date(2020, 12, 31),
        engine: EngineConfig {
            params: CrossoverParams {
                fast_period: fast,
                slow_period: slow,
                ..CrossoverParams::default()
            },
            ..EngineConfig::default()
        },
        cache_dir: PathBuf::from("data"),
        download: false,
        output_path: PathBuf::from("output.json"),
    }
}
