//! Yahoo Finance daily bars over the public chart endpoint.

use chrono::{DateTime, NaiveDate};
use reqwest::blocking::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::domain::error::RunnerError;
use crate::domain::ohlcv::Bar;
use crate::ports::data_port::DataPort;

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

fn no_data(symbol: &str, start_date: NaiveDate, end_date: NaiveDate) -> RunnerError {
    RunnerError::NoData {
        symbol: symbol.to_string(),
        start: start_date.to_string(),
        end: end_date.to_string(),
    }
}

/// Turn a chart response body into bars within `[start_date, end_date]`.
/// Rows with any missing price are skipped; a missing volume counts as 0.
pub fn parse_chart(
    symbol: &str,
    body: &str,
    start_date: NaiveDate,
    end_date: NaiveDate,
) -> Result<Vec<Bar>, RunnerError> {
    let response: ChartResponse = serde_json::from_str(body).map_err(|e| {
        RunnerError::data_source(format!("unexpected Yahoo response for {symbol}: {e}"))
    })?;

    if let Some(err) = response.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Err(no_data(symbol, start_date, end_date));
        }
        return Err(RunnerError::data_source(format!(
            "Yahoo error for {symbol}: {} {}",
            err.code, err.description
        )));
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Err(no_data(symbol, start_date, end_date));
    };
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();

    let mut bars: Vec<Bar> = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let date = DateTime::from_timestamp(ts, 0)?.date_naive();
            let at = |col: &[Option<f64>]| col.get(i).copied().flatten();
            Some(Bar {
                symbol: symbol.to_string(),
                date,
                open: at(&quote.open)?,
                high: at(&quote.high)?,
                low: at(&quote.low)?,
                close: at(&quote.close)?,
                volume: at(&quote.volume).unwrap_or(0.0),
            })
        })
        .filter(|bar| bar.date >= start_date && bar.date <= end_date && bar.is_valid())
        .collect();

    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    Ok(bars)
}

pub struct YahooAdapter {
    client: Client,
    base_url: String,
}

impl YahooAdapter {
    pub fn new() -> Result<Self, RunnerError> {
        Self::with_base_url(BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self, RunnerError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("mabt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RunnerError::data_source(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl DataPort for YahooAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<Bar>, RunnerError> {
        let to_unix =
            |d: NaiveDate| d.and_hms_opt(0, 0, 0).map_or(0, |dt| dt.and_utc().timestamp());
        // period2 is exclusive; extend by a day so end_date itself is included
        let period2 = end_date.succ_opt().map_or_else(|| to_unix(end_date), to_unix);
        let url = format!("{}/{}", self.base_url, symbol);

        info!(symbol, %start_date, %end_date, "downloading from Yahoo");
        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", to_unix(start_date).to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "history".to_string()),
            ])
            .send()
            .map_err(|e| RunnerError::data_source(format!("request for {symbol} failed: {e}")))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| RunnerError::data_source(format!("reading response for {symbol}: {e}")))?;
        debug!(symbol, %status, bytes = body.len(), "Yahoo response");

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(no_data(symbol, start_date, end_date));
        }
        if !status.is_success() {
            return Err(RunnerError::data_source(format!(
                "Yahoo request for {symbol} failed: {status}"
            )));
        }

        let bars = parse_chart(symbol, &body, start_date, end_date)?;
        if bars.is_empty() {
            return Err(no_data(symbol, start_date, end_date));
        }
        Ok(bars)
    }

    /// A remote source has no finite symbol list.
    fn list_symbols(&self) -> Result<Vec<String>, RunnerError> {
        Ok(Vec::new())
    }
}
