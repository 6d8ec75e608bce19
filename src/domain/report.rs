//! Flat, JSON-safe run summary.
//!
//! [`normalize`] pulls every reported figure out of the analyzer trees with
//! [`safe_get`], so a metric that an analyzer left out, marked undefined or
//! computed as NaN turns into an explicit default: zero for counters and
//! sums, `null` for ratios that have no meaningful zero.

use serde::Serialize;
use std::collections::BTreeMap;

use super::analysis::{Analyses, safe_get};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameters {
    pub symbols: Vec<String>,
    pub start_date: String,
    pub end_date: String,
    pub fast_period: usize,
    pub slow_period: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResults {
    pub initial_value: f64,
    pub final_value: f64,
    pub return_pct: f64,
    pub annualized_return_pct: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub calmar_ratio: Option<f64>,
    pub sqn: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    pub max_drawdown_money: Option<f64>,
    pub max_drawdown_duration_bars: Option<u64>,
    pub total_trades: u64,
    pub trades_open: u64,
    pub trades_closed: u64,
    pub win_trades: u64,
    pub loss_trades: u64,
    pub win_rate_pct: f64,
    pub total_net_pnl: f64,
    pub average_win_pnl: f64,
    pub average_loss_pnl: f64,
    pub profit_factor: Option<f64>,
    pub max_consecutive_wins: u64,
    pub max_consecutive_losses: u64,
    pub average_trade_duration_bars: Option<f64>,
    pub annual_returns: BTreeMap<String, f64>,
}

/// What a run writes out. Exactly one of `results` and `error` is set by
/// the backtest command; both serialize as `null` when absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutput {
    pub parameters: Parameters,
    pub results: Option<RunResults>,
    pub error: Option<String>,
}

impl RunOutput {
    pub fn success(parameters: Parameters, results: RunResults) -> Self {
        RunOutput {
            parameters,
            results: Some(results),
            error: None,
        }
    }

    pub fn failure(parameters: Parameters, error: impl Into<String>) -> Self {
        RunOutput {
            parameters,
            results: None,
            error: Some(error.into()),
        }
    }
}

/// won / closed * 100, 0 with no closed trades.
pub fn win_rate_pct(won: u64, closed: u64) -> f64 {
    if closed == 0 {
        return 0.0;
    }
    won as f64 / closed as f64 * 100.0
}

/// |gross won / gross lost|, `None` when nothing was lost.
pub fn profit_factor(won_total: f64, lost_total: f64) -> Option<f64> {
    if lost_total == 0.0 {
        return None;
    }
    Some((won_total / lost_total).abs())
}

pub fn return_pct(initial: f64, final_value: f64) -> f64 {
    if initial == 0.0 {
        return 0.0;
    }
    (final_value - initial) / initial * 100.0
}

pub fn normalize(analyses: &Analyses, initial_value: f64, final_value: f64) -> RunResults {
    let trades = analyses.get("trades");
    let drawdown = analyses.get("drawdown");

    let trades_closed = safe_get(trades, ["total", "closed"], 0u64);
    let win_trades = safe_get(trades, ["won", "total"], 0u64);
    let year_map: &[&str] = &[];

    RunResults {
        initial_value,
        final_value,
        return_pct: return_pct(initial_value, final_value),
        annualized_return_pct: safe_get(analyses.get("returns"), "rnorm100", None),
        sharpe_ratio: safe_get(analyses.get("sharpe"), "sharperatio", None),
        calmar_ratio: safe_get(analyses.get("calmar"), "calmar", None),
        sqn: safe_get(analyses.get("sqn"), "sqn", None),
        max_drawdown_pct: safe_get(drawdown, ["max", "drawdown"], None),
        max_drawdown_money: safe_get(drawdown, ["max", "moneydown"], None),
        max_drawdown_duration_bars: safe_get(drawdown, ["max", "len"], None),
        total_trades: safe_get(trades, ["total", "total"], 0u64),
        trades_open: safe_get(trades, ["total", "open"], 0u64),
        trades_closed,
        win_trades,
        loss_trades: safe_get(trades, ["lost", "total"], 0u64),
        win_rate_pct: win_rate_pct(win_trades, trades_closed),
        total_net_pnl: safe_get(trades, ["pnl", "net", "total"], 0.0),
        average_win_pnl: safe_get(trades, ["won", "pnl", "average"], 0.0),
        average_loss_pnl: safe_get(trades, ["lost", "pnl", "average"], 0.0),
        profit_factor: profit_factor(
            safe_get(trades, ["won", "pnl", "total"], 0.0),
            safe_get(trades, ["lost", "pnl", "total"], 0.0),
        ),
        max_consecutive_wins: safe_get(trades, ["streak", "won", "longest"], 0u64),
        max_consecutive_losses: safe_get(trades, ["streak", "lost", "longest"], 0u64),
        average_trade_duration_bars: safe_get(trades, ["len", "average"], None),
        annual_returns: safe_get(analyses.get("annualreturn"), year_map, BTreeMap::new()),
    }
}
