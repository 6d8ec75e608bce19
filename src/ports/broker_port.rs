//! Order submission port used by strategies.

use crate::domain::order::{Order, OrderId, Side};

/// The broker a strategy trades through.
///
/// Fill timing, pricing and rejection (for example insufficient cash) are the
/// implementation's concern; `submit` only queues the order.
pub trait Broker {
    fn cash(&self) -> f64;

    fn submit(&mut self, order: Order) -> OrderId;

    fn buy(&mut self, symbol: &str, quantity: i64) -> OrderId {
        self.submit(Order::market(symbol, Side::Buy, quantity))
    }

    fn sell(&mut self, symbol: &str, quantity: i64) -> OrderId {
        self.submit(Order::market(symbol, Side::Sell, quantity))
    }
}
