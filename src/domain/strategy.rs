//! Moving-average crossover strategy.
//!
//! One instance per instrument. Each bar updates a fast and a slow simple
//! moving average of the close; a golden cross (fast moves from at or below
//! slow to above it) opens a long position and a death cross (fast moves from
//! at or above slow to below it) closes it. A cross needs a previous bar with
//! both averages defined, so the first complete bar never signals.

use tracing::debug;

use crate::domain::error::RunnerError;
use crate::domain::moving_average::SimpleMovingAverage;
use crate::domain::ohlcv::Bar;
use crate::ports::broker_port::Broker;

/// How many units a golden cross buys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizer {
    Fixed(i64),
    /// Whole units worth `cash * fraction` at the signal bar's close.
    PercentOfCash(f64),
}

impl Default for Sizer {
    fn default() -> Self {
        Sizer::Fixed(1)
    }
}

impl Sizer {
    pub fn quantity(&self, cash: f64, price: f64) -> i64 {
        match *self {
            Sizer::Fixed(units) => units.max(0),
            Sizer::PercentOfCash(fraction) => {
                if price <= 0.0 || cash <= 0.0 || fraction <= 0.0 {
                    return 0;
                }
                (cash * fraction / price).floor() as i64
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub sizer: Sizer,
}

impl Default for CrossoverParams {
    fn default() -> Self {
        CrossoverParams {
            fast_period: 10,
            slow_period: 30,
            sizer: Sizer::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Flat,
    Long,
}

/// A state change together with the quantity ordered for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Enter { quantity: i64 },
    Exit { quantity: i64 },
}

#[derive(Debug, Clone)]
pub struct CrossoverStrategy {
    symbol: String,
    params: CrossoverParams,
    fast: SimpleMovingAverage,
    slow: SimpleMovingAverage,
    previous: Option<(f64, f64)>,
    position: i64,
    bars_seen: usize,
}

impl CrossoverStrategy {
    pub fn new(symbol: &str, params: CrossoverParams) -> Result<Self, RunnerError> {
        let fast = SimpleMovingAverage::new(params.fast_period).ok_or_else(|| {
            RunnerError::ConfigInvalid {
                section: "strategy".into(),
                key: "fast_period".into(),
                reason: "fast_period must be positive".into(),
            }
        })?;
        let slow = SimpleMovingAverage::new(params.slow_period).ok_or_else(|| {
            RunnerError::ConfigInvalid {
                section: "strategy".into(),
                key: "slow_period".into(),
                reason: "slow_period must be positive".into(),
            }
        })?;
        Ok(Self {
            symbol: symbol.to_string(),
            params,
            fast,
            slow,
            previous: None,
            position: 0,
            bars_seen: 0,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> StrategyState {
        if self.position > 0 {
            StrategyState::Long
        } else {
            StrategyState::Flat
        }
    }

    pub fn bars_seen(&self) -> usize {
        self.bars_seen
    }

    /// Latest (fast, slow) averages, once both are defined.
    pub fn averages(&self) -> Option<(f64, f64)> {
        self.previous
    }

    /// Consume one bar and submit at most one order.
    pub fn on_bar(&mut self, bar: &Bar, broker: &mut dyn Broker) -> Option<Transition> {
        self.bars_seen += 1;
        let fast = self.fast.next(bar.close);
        let slow = self.slow.next(bar.close);
        let (Some(fast), Some(slow)) = (fast, slow) else {
            return None;
        };

        let Some((prev_fast, prev_slow)) = self.previous.replace((fast, slow)) else {
            return None;
        };

        match self.state() {
            StrategyState::Flat if fast > slow && prev_fast <= prev_slow => {
                let quantity = self.params.sizer.quantity(broker.cash(), bar.close);
                if quantity <= 0 {
                    debug!(
                        symbol = %self.symbol,
                        date = %bar.date,
                        "golden cross sized to zero units, holding"
                    );
                    return None;
                }
                broker.buy(&self.symbol, quantity);
                self.position = quantity;
                debug!(
                    symbol = %self.symbol,
                    date = %bar.date,
                    fast,
                    slow,
                    quantity,
                    "golden cross"
                );
                Some(Transition::Enter { quantity })
            }
            StrategyState::Long if fast < slow && prev_fast >= prev_slow => {
                let quantity = self.position;
                broker.sell(&self.symbol, quantity);
                self.position = 0;
                debug!(
                    symbol = %self.symbol,
                    date = %bar.date,
                    fast,
                    slow,
                    quantity,
                    "death cross"
                );
                Some(Transition::Exit { quantity })
            }
            _ => None,
        }
    }
}
