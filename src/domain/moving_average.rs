//! Streaming simple moving average.
//!
//! SMA(n)[i] = sum(C[i-j] for j in 0..n) / n
//! Warmup: no value until n closes have been seen.
//!
//! The mean is taken over the retained window on every update. Offsetting by
//! the oldest close makes a window of equal closes average to exactly that
//! close, whatever came before it.

use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct SimpleMovingAverage {
    period: usize,
    window: VecDeque<f64>,
}

impl SimpleMovingAverage {
    /// Returns `None` for a zero period.
    pub fn new(period: usize) -> Option<Self> {
        if period == 0 {
            return None;
        }
        Some(Self {
            period,
            window: VecDeque::with_capacity(period),
        })
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Push the next close and return the average once the window is full.
    pub fn next(&mut self, close: f64) -> Option<f64> {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(close);
        self.value()
    }

    pub fn value(&self) -> Option<f64> {
        if self.window.len() < self.period {
            return None;
        }
        let anchor = *self.window.front()?;
        let offset: f64 = self.window.iter().map(|close| close - anchor).sum();
        Some(anchor + offset / self.period as f64)
    }
}
