mod common;

use common::bars_from_closes;
use mabt::domain::order::{Order, OrderId, Side};
use mabt::domain::strategy::{
    CrossoverParams, CrossoverStrategy, Sizer, StrategyState, Transition,
};
use mabt::ports::broker_port::Broker;
use proptest::prelude::*;

struct RecordingBroker {
    cash: f64,
    orders: Vec<Order>,
}

impl RecordingBroker {
    fn new() -> Self {
        Self {
            cash: 10_000.0,
            orders: Vec::new(),
        }
    }
}

impl Broker for RecordingBroker {
    fn cash(&self) -> f64 {
        self.cash
    }

    fn submit(&mut self, order: Order) -> OrderId {
        self.orders.push(order);
        OrderId(self.orders.len() as u64)
    }
}

fn strategy(fast: usize, slow: usize) -> CrossoverStrategy {
    CrossoverStrategy::new(
        "TEST",
        CrossoverParams {
            fast_period: fast,
            slow_period: slow,
            sizer: Sizer::Fixed(1),
        },
    )
    .unwrap()
}

fn run(strategy: &mut CrossoverStrategy, closes: &[f64]) -> RecordingBroker {
    let mut broker = RecordingBroker::new();
    for bar in bars_from_closes("TEST", closes) {
        strategy.on_bar(&bar, &mut broker);
    }
    broker
}

#[test]
fn crossover_series_buys_then_sells() {
    let closes = common::crossover_closes();
    let mut strategy = strategy(10, 30);
    let mut broker = RecordingBroker::new();
    let transitions: Vec<(usize, Transition)> = bars_from_closes("TEST", &closes)
        .iter()
        .enumerate()
        .filter_map(|(i, bar)| strategy.on_bar(bar, &mut broker).map(|t| (i, t)))
        .collect();

    // index 29 is the first bar with both averages, and they are equal there
    assert_eq!(
        transitions,
        vec![
            (30, Transition::Enter { quantity: 1 }),
            (55, Transition::Exit { quantity: 1 }),
        ]
    );
    let sides: Vec<Side> = broker.orders.iter().map(|o| o.side).collect();
    assert_eq!(sides, vec![Side::Buy, Side::Sell]);
    assert_eq!(strategy.state(), StrategyState::Flat);
}

#[test]
fn constant_tail_after_noisy_prefix_stays_flat() {
    let closes: Vec<f64> = (0..150usize)
        .map(|i| {
            if i < 50 {
                100.0 + ((i * 37) % 17) as f64 * 0.173
            } else {
                101.37
            }
        })
        .collect();
    let mut strategy = strategy(10, 30);
    let mut broker = RecordingBroker::new();
    let late_orders = bars_from_closes("TEST", &closes)
        .iter()
        .enumerate()
        .filter_map(|(i, bar)| strategy.on_bar(bar, &mut broker).map(|_| i))
        .filter(|&i| i >= 79)
        .count();

    assert_eq!(late_orders, 0);
    assert_eq!(strategy.averages(), Some((101.37, 101.37)));
}

#[test]
fn flat_series_never_trades() {
    let mut strategy = strategy(3, 5);
    let broker = run(&mut strategy, &[50.0; 40]);
    assert!(broker.orders.is_empty());
}

proptest! {
    #[test]
    fn fewer_bars_than_slow_window_never_trade(
        (fast, slow, closes) in (2usize..40).prop_flat_map(|slow| {
            (1..slow, Just(slow), prop::collection::vec(1.0f64..500.0, 0..slow))
        })
    ) {
        let mut strategy = strategy(fast, slow);
        let broker = run(&mut strategy, &closes);

        prop_assert!(broker.orders.is_empty());
        prop_assert_eq!(strategy.state(), StrategyState::Flat);
        prop_assert!(strategy.averages().is_none());
    }

    #[test]
    fn flat_rise_fall_trades_exactly_once(
        rises in prop::collection::vec(0.01f64..5.0, 20),
        falls in prop::collection::vec(0.01f64..5.0, 20),
    ) {
        // flat start so both averages agree on their first complete bar
        let mut closes = vec![100.0; 5];
        let mut price = 100.0;
        for step in rises {
            price += step;
            closes.push(price);
        }
        for step in falls {
            price -= step;
            closes.push(price);
        }

        let mut strategy = strategy(3, 5);
        let broker = run(&mut strategy, &closes);

        let sides: Vec<Side> = broker.orders.iter().map(|o| o.side).collect();
        prop_assert_eq!(sides, vec![Side::Buy, Side::Sell]);
        prop_assert!(broker.orders.iter().all(|o| o.quantity == 1));
        prop_assert_eq!(strategy.state(), StrategyState::Flat);
    }
}
