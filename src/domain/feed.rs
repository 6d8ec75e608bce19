//! Per-symbol bar feeds and the unified date timeline.

use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone)]
pub struct DataFeed {
    pub symbol: String,
    pub bars: Vec<Bar>,
    pub date_index: HashMap<NaiveDate, usize>,
}

impl DataFeed {
    /// Bars are sorted by date; a repeated date keeps the first bar seen.
    pub fn new(symbol: String, mut bars: Vec<Bar>) -> Self {
        bars.sort_by_key(|b| b.date);
        bars.dedup_by_key(|b| b.date);
        let date_index = bars
            .iter()
            .enumerate()
            .map(|(i, bar)| (bar.date, i))
            .collect();
        Self {
            symbol,
            bars,
            date_index,
        }
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    pub fn get_bar(&self, date: NaiveDate) -> Option<&Bar> {
        self.date_index.get(&date).map(|&i| &self.bars[i])
    }

    pub fn get_bar_index(&self, date: NaiveDate) -> Option<usize> {
        self.date_index.get(&date).copied()
    }
}

pub fn build_timeline(feeds: &[DataFeed]) -> Vec<NaiveDate> {
    let unique_dates: BTreeSet<NaiveDate> = feeds
        .iter()
        .flat_map(|feed| feed.bars.iter().map(|bar| bar.date))
        .collect();
    unique_dates.into_iter().collect()
}
