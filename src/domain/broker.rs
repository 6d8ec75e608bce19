//! Simulated broker: order queue, fills and cash accounting.
//!
//! Market orders are queued by [`Broker::submit`] and filled on the
//! instrument's next bar at its open, adjusted for slippage:
//! - buy:  open * (1 + slippage_pct / 100)
//! - sell: open * (1 - slippage_pct / 100)
//!
//! Commission is `commission_pct` percent of the traded value on each fill.
//! A buy whose cost plus commission exceeds cash is rejected. A sell larger
//! than the held quantity is clamped to it; there is no shorting.

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::ohlcv::Bar;
use super::order::{Order, OrderId, Side};
use super::portfolio::Portfolio;
use super::position::{ClosedTrade, Position};
use crate::ports::broker_port::Broker;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BrokerConfig {
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

/// Commission for a fill: trade_value * pct / 100.
pub fn calculate_commission(trade_value: f64, config: &BrokerConfig) -> f64 {
    trade_value * config.commission_pct / 100.0
}

pub fn apply_slippage_buy(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 + slippage_pct / 100.0)
}

pub fn apply_slippage_sell(market_price: f64, slippage_pct: f64) -> f64 {
    market_price * (1.0 - slippage_pct / 100.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub order_id: OrderId,
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
    pub price: f64,
    pub commission: f64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    Filled(Fill),
    Rejected { order_id: OrderId, reason: String },
}

#[derive(Debug, Clone)]
pub struct SimBroker {
    portfolio: Portfolio,
    config: BrokerConfig,
    pending: Vec<(OrderId, Order)>,
    next_id: u64,
}

impl SimBroker {
    pub fn new(initial_cash: f64, config: BrokerConfig) -> Self {
        Self {
            portfolio: Portfolio::new(initial_cash),
            config,
            pending: Vec::new(),
            next_id: 1,
        }
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn portfolio_mut(&mut self) -> &mut Portfolio {
        &mut self.portfolio
    }

    pub fn into_portfolio(self) -> Portfolio {
        self.portfolio
    }

    /// Fill every pending order for `bar.symbol` at the bar's open.
    /// `bar_index` is the bar's position in its own feed.
    pub fn process_bar(&mut self, bar: &Bar, bar_index: usize) -> Vec<FillOutcome> {
        let (due, keep): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(_, order)| order.symbol == bar.symbol);
        self.pending = keep;

        due.into_iter()
            .map(|(id, order)| {
                let outcome = match order.side {
                    Side::Buy => self.fill_buy(id, &order, bar, bar_index),
                    Side::Sell => self.fill_sell(id, &order, bar, bar_index),
                };
                match &outcome {
                    FillOutcome::Filled(fill) => debug!(
                        symbol = %fill.symbol,
                        side = %fill.side,
                        quantity = fill.quantity,
                        price = fill.price,
                        date = %fill.date,
                        "order filled"
                    ),
                    FillOutcome::Rejected { order_id, reason } => {
                        warn!(
                            order = order_id.0,
                            symbol = %order.symbol,
                            "order rejected: {reason}"
                        )
                    }
                }
                outcome
            })
            .collect()
    }

    /// Drop orders that never saw another bar. Returns how many were dropped.
    pub fn cancel_pending(&mut self) -> usize {
        let count = self.pending.len();
        for (id, order) in self.pending.drain(..) {
            warn!(
                order = id.0,
                symbol = %order.symbol,
                side = %order.side,
                "order cancelled at end of data"
            );
        }
        count
    }

    fn fill_buy(&mut self, id: OrderId, order: &Order, bar: &Bar, bar_index: usize) -> FillOutcome {
        if order.quantity <= 0 {
            return FillOutcome::Rejected {
                order_id: id,
                reason: "non-positive quantity".into(),
            };
        }

        let price = apply_slippage_buy(bar.open, self.config.slippage_pct);
        let cost = order.quantity as f64 * price;
        let commission = calculate_commission(cost, &self.config);
        if cost + commission > self.portfolio.cash {
            return FillOutcome::Rejected {
                order_id: id,
                reason: format!(
                    "insufficient cash: need {:.2}, have {:.2}",
                    cost + commission,
                    self.portfolio.cash
                ),
            };
        }

        self.portfolio.cash -= cost + commission;
        match self.portfolio.get_position_mut(&order.symbol) {
            Some(position) => position.increase(order.quantity, price, commission),
            None => self.portfolio.add_position(Position {
                symbol: order.symbol.clone(),
                quantity: order.quantity,
                peak_quantity: order.quantity,
                entry_price: price,
                entry_date: bar.date,
                entry_bar: bar_index,
                commission,
                realized_pnl: 0.0,
            }),
        }

        FillOutcome::Filled(Fill {
            order_id: id,
            symbol: order.symbol.clone(),
            side: Side::Buy,
            quantity: order.quantity,
            price,
            commission,
            date: bar.date,
        })
    }

    fn fill_sell(
        &mut self,
        id: OrderId,
        order: &Order,
        bar: &Bar,
        bar_index: usize,
    ) -> FillOutcome {
        let held = self.portfolio.quantity(&order.symbol);
        let quantity = order.quantity.min(held);
        if quantity <= 0 {
            return FillOutcome::Rejected {
                order_id: id,
                reason: format!("nothing to sell: holding {held}"),
            };
        }

        let price = apply_slippage_sell(bar.open, self.config.slippage_pct);
        let value = quantity as f64 * price;
        let commission = calculate_commission(value, &self.config);
        self.portfolio.cash += value - commission;

        let closed = match self.portfolio.get_position_mut(&order.symbol) {
            Some(position) => {
                position.realized_pnl += quantity as f64 * (price - position.entry_price);
                position.commission += commission;
                position.quantity -= quantity;
                position.quantity == 0
            }
            None => false,
        };

        if closed {
            if let Some(position) = self.portfolio.remove_position(&order.symbol) {
                self.portfolio.record_trade(ClosedTrade {
                    symbol: position.symbol,
                    quantity: position.peak_quantity,
                    entry_price: position.entry_price,
                    exit_price: price,
                    entry_date: position.entry_date,
                    exit_date: bar.date,
                    bars_held: bar_index.saturating_sub(position.entry_bar),
                    pnl: position.realized_pnl,
                    pnl_net: position.realized_pnl - position.commission,
                });
            }
        }

        FillOutcome::Filled(Fill {
            order_id: id,
            symbol: order.symbol.clone(),
            side: Side::Sell,
            quantity,
            price,
            commission,
            date: bar.date,
        })
    }
}

impl Broker for SimBroker {
    fn cash(&self) -> f64 {
        self.portfolio.cash
    }

    fn submit(&mut self, order: Order) -> OrderId {
        let id = OrderId(self.next_id);
        self.next_id += 1;
        debug!(
            order = id.0,
            symbol = %order.symbol,
            side = %order.side,
            quantity = order.quantity,
            "order submitted"
        );
        self.pending.push((id, order));
        id
    }
}
