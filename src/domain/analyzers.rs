//! Post-run analyzers.
//!
//! Each analyzer reads the finished portfolio (equity curve, closed trades,
//! open positions) and emits an [`AnalysisNode`] tree. Trees are allowed to
//! be partial: a metric that is undefined for the run is left `Missing` or
//! NaN and resolved later by the report normalizer.

use chrono::Datelike;
use std::collections::BTreeMap;

use super::analysis::{Analyses, AnalysisNode};
use super::portfolio::{EquityPoint, Portfolio};
use super::position::ClosedTrade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub trait Analyzer {
    fn name(&self) -> &str;
    fn analyze(&self, portfolio: &Portfolio) -> AnalysisNode;
}

/// The analyzer set the backtest command runs.
pub fn default_analyzers(risk_free_rate: f64) -> Vec<Box<dyn Analyzer>> {
    vec![
        Box::new(SharpeRatio { risk_free_rate }),
        Box::new(DrawDown),
        Box::new(TradeAnalyzer),
        Box::new(Returns),
        Box::new(Calmar),
        Box::new(Sqn),
        Box::new(AnnualReturn),
    ]
}

pub fn run_analyzers(analyzers: &[Box<dyn Analyzer>], portfolio: &Portfolio) -> Analyses {
    let mut analyses = Analyses::new();
    for analyzer in analyzers {
        analyses.insert(analyzer.name(), analyzer.analyze(portfolio));
    }
    analyses
}

fn bar_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn stddev(values: &[f64]) -> f64 {
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
struct DrawdownStats {
    drawdown: f64,
    moneydown: f64,
    len: usize,
    max_drawdown: f64,
    max_moneydown: f64,
    max_len: usize,
}

/// Drawdown in percent of the running peak, its money value, and the number
/// of bars since that peak; plus the maxima of each over the run.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> DrawdownStats {
    let mut stats = DrawdownStats::default();
    let Some(first) = equity_curve.first() else {
        return stats;
    };

    let mut peak = first.equity;
    for point in equity_curve {
        if point.equity >= peak {
            peak = point.equity;
            stats.len = 0;
        } else {
            stats.len += 1;
        }
        stats.moneydown = peak - point.equity;
        stats.drawdown = if peak > 0.0 {
            100.0 * stats.moneydown / peak
        } else {
            0.0
        };
        stats.max_drawdown = stats.max_drawdown.max(stats.drawdown);
        stats.max_moneydown = stats.max_moneydown.max(stats.moneydown);
        stats.max_len = stats.max_len.max(stats.len);
    }
    stats
}

/// (rtot, ravg, rnorm): log total return, log return per bar, and the
/// per-bar return compounded over a trading year.
fn log_returns(portfolio: &Portfolio) -> Option<(f64, f64, f64)> {
    let bars = portfolio.equity_curve.len();
    let initial = portfolio.initial_capital;
    let last = portfolio.final_value();
    if bars == 0 || initial <= 0.0 || last <= 0.0 {
        return None;
    }
    let rtot = (last / initial).ln();
    let ravg = rtot / bars as f64;
    let rnorm = (ravg * TRADING_DAYS_PER_YEAR).exp() - 1.0;
    Some((rtot, ravg, rnorm))
}

/// Annualized Sharpe ratio of per-bar returns in excess of the risk-free
/// rate. Undefined with fewer than two returns or zero volatility.
pub struct SharpeRatio {
    pub risk_free_rate: f64,
}

impl Analyzer for SharpeRatio {
    fn name(&self) -> &str {
        "sharpe"
    }

    fn analyze(&self, portfolio: &Portfolio) -> AnalysisNode {
        let daily_rf = (1.0 + self.risk_free_rate).powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0;
        let excess: Vec<f64> = bar_returns(&portfolio.equity_curve)
            .into_iter()
            .map(|r| r - daily_rf)
            .collect();

        let ratio = if excess.len() < 2 {
            AnalysisNode::Missing
        } else {
            let sd = stddev(&excess);
            if sd > 0.0 {
                AnalysisNode::Float(mean(&excess) / sd * TRADING_DAYS_PER_YEAR.sqrt())
            } else {
                AnalysisNode::Missing
            }
        };
        AnalysisNode::map().with("sharperatio", ratio)
    }
}

pub struct DrawDown;

impl Analyzer for DrawDown {
    fn name(&self) -> &str {
        "drawdown"
    }

    fn analyze(&self, portfolio: &Portfolio) -> AnalysisNode {
        let stats = compute_drawdown(&portfolio.equity_curve);
        AnalysisNode::map()
            .with("drawdown", stats.drawdown)
            .with("moneydown", stats.moneydown)
            .with("len", stats.len)
            .with(
                "max",
                AnalysisNode::map()
                    .with("drawdown", stats.max_drawdown)
                    .with("moneydown", stats.max_moneydown)
                    .with("len", stats.max_len),
            )
    }
}

/// Trade statistics. Only `total` is reported until at least one trade has
/// closed; the other branches are absent rather than zero-filled.
pub struct TradeAnalyzer;

fn pnl_branch(pnls: &[f64], extreme: Option<f64>) -> AnalysisNode {
    let total: f64 = pnls.iter().sum();
    let average = if pnls.is_empty() {
        AnalysisNode::Missing
    } else {
        AnalysisNode::Float(total / pnls.len() as f64)
    };
    AnalysisNode::map()
        .with("total", total)
        .with("average", average)
        .with("max", extreme)
}

fn longest_streaks(trades: &[ClosedTrade]) -> ((usize, usize), (usize, usize)) {
    let (mut won_current, mut won_longest) = (0usize, 0usize);
    let (mut lost_current, mut lost_longest) = (0usize, 0usize);
    for trade in trades {
        if trade.is_win() {
            won_current += 1;
            lost_current = 0;
        } else if trade.is_loss() {
            lost_current += 1;
            won_current = 0;
        } else {
            won_current = 0;
            lost_current = 0;
        }
        won_longest = won_longest.max(won_current);
        lost_longest = lost_longest.max(lost_current);
    }
    ((won_current, won_longest), (lost_current, lost_longest))
}

impl Analyzer for TradeAnalyzer {
    fn name(&self) -> &str {
        "trades"
    }

    fn analyze(&self, portfolio: &Portfolio) -> AnalysisNode {
        let trades = &portfolio.closed_trades;
        let open = portfolio.positions.len();
        let closed = trades.len();

        let mut total = AnalysisNode::map().with("total", open + closed);
        if open + closed == 0 {
            return AnalysisNode::map().with("total", total);
        }
        total = total.with("open", open).with("closed", closed);
        if closed == 0 {
            return AnalysisNode::map().with("total", total);
        }

        let gross: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
        let net: Vec<f64> = trades.iter().map(|t| t.pnl_net).collect();
        let wins: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_win())
            .map(|t| t.pnl_net)
            .collect();
        let losses: Vec<f64> = trades
            .iter()
            .filter(|t| t.is_loss())
            .map(|t| t.pnl_net)
            .collect();
        let largest_win = wins.iter().copied().reduce(f64::max);
        let largest_loss = losses.iter().copied().reduce(f64::min);

        let ((won_current, won_longest), (lost_current, lost_longest)) = longest_streaks(trades);

        let lens: Vec<usize> = trades.iter().map(|t| t.bars_held).collect();
        let len_total: usize = lens.iter().sum();

        AnalysisNode::map()
            .with("total", total)
            .with(
                "streak",
                AnalysisNode::map()
                    .with(
                        "won",
                        AnalysisNode::map()
                            .with("current", won_current)
                            .with("longest", won_longest),
                    )
                    .with(
                        "lost",
                        AnalysisNode::map()
                            .with("current", lost_current)
                            .with("longest", lost_longest),
                    ),
            )
            .with(
                "pnl",
                AnalysisNode::map()
                    .with("gross", pnl_branch(&gross, None))
                    .with("net", pnl_branch(&net, None)),
            )
            .with(
                "won",
                AnalysisNode::map()
                    .with("total", wins.len())
                    .with("pnl", pnl_branch(&wins, largest_win)),
            )
            .with(
                "lost",
                AnalysisNode::map()
                    .with("total", losses.len())
                    .with("pnl", pnl_branch(&losses, largest_loss)),
            )
            .with(
                "len",
                AnalysisNode::map()
                    .with("total", len_total)
                    .with("average", len_total as f64 / closed as f64)
                    .with("max", lens.iter().copied().max())
                    .with("min", lens.iter().copied().min()),
            )
    }
}

pub struct Returns;

impl Analyzer for Returns {
    fn name(&self) -> &str {
        "returns"
    }

    fn analyze(&self, portfolio: &Portfolio) -> AnalysisNode {
        match log_returns(portfolio) {
            Some((rtot, ravg, rnorm)) => AnalysisNode::map()
                .with("rtot", rtot)
                .with("ravg", ravg)
                .with("rnorm", rnorm)
                .with("rnorm100", rnorm * 100.0),
            None => AnalysisNode::map(),
        }
    }
}

/// Annualized return over maximum drawdown. NaN when the run never drew
/// down.
pub struct Calmar;

impl Analyzer for Calmar {
    fn name(&self) -> &str {
        "calmar"
    }

    fn analyze(&self, portfolio: &Portfolio) -> AnalysisNode {
        let calmar = log_returns(portfolio).map(|(_, _, rnorm)| {
            let max_dd = compute_drawdown(&portfolio.equity_curve).max_drawdown / 100.0;
            if max_dd > 0.0 { rnorm / max_dd } else { f64::NAN }
        });
        AnalysisNode::map().with("calmar", calmar)
    }
}

/// System Quality Number: sqrt(n) * mean(net pnl) / stddev(net pnl).
/// Zero with fewer than two trades, undefined when every trade made the
/// same PnL.
pub struct Sqn;

impl Analyzer for Sqn {
    fn name(&self) -> &str {
        "sqn"
    }

    fn analyze(&self, portfolio: &Portfolio) -> AnalysisNode {
        let pnls: Vec<f64> = portfolio.closed_trades.iter().map(|t| t.pnl_net).collect();
        let sqn = if pnls.len() < 2 {
            AnalysisNode::Float(0.0)
        } else {
            let sd = stddev(&pnls);
            if sd > 0.0 {
                AnalysisNode::Float((pnls.len() as f64).sqrt() * mean(&pnls) / sd)
            } else {
                AnalysisNode::Missing
            }
        };
        AnalysisNode::map()
            .with("sqn", sqn)
            .with("trades", pnls.len())
    }
}

/// Return per calendar year, from the last equity of the previous year (or
/// the starting capital) to the last equity of the year.
pub struct AnnualReturn;

impl Analyzer for AnnualReturn {
    fn name(&self) -> &str {
        "annualreturn"
    }

    fn analyze(&self, portfolio: &Portfolio) -> AnalysisNode {
        let mut year_end: BTreeMap<i32, f64> = BTreeMap::new();
        for point in &portfolio.equity_curve {
            year_end.insert(point.date.year(), point.equity);
        }

        let mut years = BTreeMap::new();
        let mut previous = portfolio.initial_capital;
        for (year, equity) in year_end {
            let ret = if previous > 0.0 {
                AnalysisNode::Float(equity / previous - 1.0)
            } else {
                AnalysisNode::Missing
            };
            years.insert(year.to_string(), ret);
            previous = equity;
        }
        AnalysisNode::Map(years)
    }
}
