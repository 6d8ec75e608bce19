//! Daily OHLCV bar.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// A bar is usable when every price is finite and non-negative and the
    /// volume is non-negative.
    pub fn is_valid(&self) -> bool {
        [self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite() && *v >= 0.0)
    }
}
