//! Bar-by-bar backtest loop.
//!
//! For every date of the unified timeline, and for every symbol with a bar on
//! that date: pending orders fill at the bar's open, then the portfolio is
//! marked at the close, then the symbol's strategy sees the bar. Orders a
//! strategy submits on the last bar of its feed never fill and are cancelled
//! when the data runs out.

use std::collections::HashMap;
use tracing::{debug, info};

use super::analysis::Analyses;
use super::analyzers::{Analyzer, default_analyzers, run_analyzers};
use super::broker::{BrokerConfig, FillOutcome, SimBroker};
use super::error::RunnerError;
use super::feed::{DataFeed, build_timeline};
use super::portfolio::Portfolio;
use super::strategy::{CrossoverParams, CrossoverStrategy};

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub initial_cash: f64,
    pub broker: BrokerConfig,
    pub params: CrossoverParams,
    pub risk_free_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            initial_cash: 10_000.0,
            broker: BrokerConfig::default(),
            params: CrossoverParams::default(),
            risk_free_rate: 0.01,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestResult {
    pub portfolio: Portfolio,
    pub initial_value: f64,
    pub final_value: f64,
    pub analyses: Analyses,
    pub bars_processed: usize,
    pub orders_rejected: usize,
    pub orders_cancelled: usize,
}

pub struct Engine {
    config: EngineConfig,
    feeds: Vec<DataFeed>,
    analyzers: Vec<Box<dyn Analyzer>>,
}

impl Engine {
    /// An engine with the default analyzer set registered.
    pub fn new(config: EngineConfig) -> Self {
        let analyzers = default_analyzers(config.risk_free_rate);
        Self {
            config,
            feeds: Vec::new(),
            analyzers,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn add_feed(&mut self, feed: DataFeed) {
        self.feeds.push(feed);
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }

    pub fn run(self) -> Result<BacktestResult, RunnerError> {
        if self.feeds.is_empty() {
            return Err(RunnerError::data_source(
                "no data feeds added to the engine",
            ));
        }

        let mut strategies = self
            .feeds
            .iter()
            .map(|feed| CrossoverStrategy::new(&feed.symbol, self.config.params))
            .collect::<Result<Vec<_>, _>>()?;

        let mut broker = SimBroker::new(self.config.initial_cash, self.config.broker.clone());
        let timeline = build_timeline(&self.feeds);
        let mut last_close: HashMap<String, f64> = HashMap::new();
        let mut bars_processed = 0usize;
        let mut orders_rejected = 0usize;

        info!(
            feeds = self.feeds.len(),
            dates = timeline.len(),
            fast = self.config.params.fast_period,
            slow = self.config.params.slow_period,
            "starting backtest"
        );

        for &date in &timeline {
            for feed in &self.feeds {
                if let Some(index) = feed.get_bar_index(date) {
                    let bar = &feed.bars[index];
                    orders_rejected += broker
                        .process_bar(bar, index)
                        .iter()
                        .filter(|o| matches!(o, FillOutcome::Rejected { .. }))
                        .count();
                    last_close.insert(feed.symbol.clone(), bar.close);
                }
            }

            let equity = broker.portfolio().total_equity(&last_close);
            broker.portfolio_mut().record_equity(date, equity);

            for (feed, strategy) in self.feeds.iter().zip(strategies.iter_mut()) {
                if let Some(bar) = feed.get_bar(date) {
                    strategy.on_bar(bar, &mut broker);
                    bars_processed += 1;
                }
            }
        }

        for strategy in &strategies {
            debug!(
                symbol = strategy.symbol(),
                bars = strategy.bars_seen(),
                state = ?strategy.state(),
                averages = ?strategy.averages(),
                "strategy finished"
            );
        }

        let orders_cancelled = broker.cancel_pending();
        let portfolio = broker.into_portfolio();
        let analyses = run_analyzers(&self.analyzers, &portfolio);
        debug!(
            analyzers = analyses.len(),
            names = %analyses.names().collect::<Vec<_>>().join(","),
            "analyzers complete"
        );

        let final_value = portfolio.final_value();
        info!(
            bars = bars_processed,
            closed_trades = portfolio.closed_trades.len(),
            open_positions = portfolio.positions.len(),
            final_value,
            "backtest complete"
        );

        Ok(BacktestResult {
            initial_value: self.config.initial_cash,
            final_value,
            portfolio,
            analyses,
            bars_processed,
            orders_rejected,
            orders_cancelled,
        })
    }
}
