//! Portfolio state and equity tracking.

use chrono::NaiveDate;
use std::collections::HashMap;

use super::position::{ClosedTrade, Position};

#[derive(Debug, Clone, PartialEq)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_capital: f64,
    pub positions: HashMap<String, Position>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(initial_capital: f64) -> Self {
        Portfolio {
            cash: initial_capital,
            initial_capital,
            positions: HashMap::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn add_position(&mut self, position: Position) {
        self.positions.insert(position.symbol.clone(), position);
    }

    pub fn get_position_mut(&mut self, symbol: &str) -> Option<&mut Position> {
        self.positions.get_mut(symbol)
    }

    pub fn remove_position(&mut self, symbol: &str) -> Option<Position> {
        self.positions.remove(symbol)
    }

    pub fn quantity(&self, symbol: &str) -> i64 {
        self.positions.get(symbol).map_or(0, |p| p.quantity)
    }

    pub fn record_trade(&mut self, trade: ClosedTrade) {
        self.closed_trades.push(trade);
    }

    pub fn record_equity(&mut self, date: NaiveDate, equity: f64) {
        self.equity_curve.push(EquityPoint { date, equity });
    }

    /// Cash plus open positions marked at `price_map`. A position without a
    /// price is marked at its entry price.
    pub fn total_equity(&self, price_map: &HashMap<String, f64>) -> f64 {
        let position_value: f64 = self
            .positions
            .values()
            .map(|pos| {
                let price = price_map
                    .get(&pos.symbol)
                    .copied()
                    .unwrap_or(pos.entry_price);
                pos.market_value(price)
            })
            .sum();
        self.cash + position_value
    }

    /// Last recorded equity, or the starting capital before any bar.
    pub fn final_value(&self) -> f64 {
        self.equity_curve
            .last()
            .map_or(self.initial_capital, |p| p.equity)
    }
}
