//! Market orders submitted through the broker port.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OrderId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub quantity: i64,
}

impl Order {
    pub fn market(symbol: &str, side: Side, quantity: i64) -> Self {
        Order {
            symbol: symbol.to_string(),
            side,
            quantity,
        }
    }
}
