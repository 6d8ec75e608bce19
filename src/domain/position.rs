//! Filled positions and completed round trips.

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    /// Largest quantity held at any point of the trade.
    pub peak_quantity: i64,
    pub entry_price: f64,
    pub entry_date: NaiveDate,
    pub entry_bar: usize,
    /// Commission paid on every fill of this trade so far.
    pub commission: f64,
    /// Gross PnL already realized by partial exits.
    pub realized_pnl: f64,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity as f64 * price
    }

    /// Add to the position at `price`, averaging the entry price.
    pub fn increase(&mut self, quantity: i64, price: f64, commission: f64) {
        let total = self.quantity + quantity;
        if total > 0 {
            self.entry_price = (self.quantity as f64 * self.entry_price
                + quantity as f64 * price)
                / total as f64;
        }
        self.quantity = total;
        self.peak_quantity = self.peak_quantity.max(total);
        self.commission += commission;
    }
}

/// A position that went from flat back to flat.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub symbol: String,
    pub quantity: i64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub bars_held: usize,
    /// Price PnL before commission.
    pub pnl: f64,
    /// PnL after every entry and exit commission.
    pub pnl_net: f64,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.pnl_net > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl_net < 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_position() -> Position {
        Position {
            symbol: "AAPL".into(),
            quantity: 100,
            peak_quantity: 100,
            entry_price: 50.0,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            entry_bar: 3,
            commission: 5.0,
            realized_pnl: 0.0,
        }
    }

    #[test]
    fn market_value() {
        let pos = sample_position();
        assert!((pos.market_value(55.0) - 5500.0).abs() < f64::EPSILON);
    }

    #[test]
    fn increase_averages_entry() {
        let mut pos = sample_position();
        pos.increase(100, 60.0, 2.0);
        assert_eq!(pos.quantity, 200);
        assert_eq!(pos.peak_quantity, 200);
        assert!((pos.entry_price - 55.0).abs() < f64::EPSILON);
        assert!((pos.commission - 7.0).abs() < f64::EPSILON);
    }

    #[test]
    fn trade_outcome_uses_net_pnl() {
        let trade = ClosedTrade {
            symbol: "AAPL".into(),
            quantity: 100,
            entry_price: 50.0,
            exit_price: 50.05,
            entry_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            exit_date: NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(),
            bars_held: 5,
            pnl: 5.0,
            pnl_net: -5.0,
        };
        assert!(!trade.is_win());
        assert!(trade.is_loss());

        let even = ClosedTrade {
            pnl_net: 0.0,
            ..trade
        };
        assert!(!even.is_win());
        assert!(!even.is_loss());
    }
}
