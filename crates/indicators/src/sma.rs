use crate::Average;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tickavg_core::Tick;

/// Trailing mean of the last `N` prices.
///
/// While the window is filling, the divisor is the number of prices seen so
/// far rather than `N`, so a value is produced for every tick.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    len: usize,
    buffer: VecDeque<Decimal>,
    sum: Decimal,
}

impl MovingAverage {
    /// # Panics
    ///
    /// Panics if `period` is zero. Validate with
    /// [`AverageConfig::validate`](tickavg_core::AverageConfig::validate) first.
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "moving average period must be > 0");
        Self {
            len: period,
            buffer: VecDeque::with_capacity(period + 1),
            sum: Decimal::ZERO,
        }
    }

    /// Get the current average without feeding new data.
    pub fn value(&self) -> Option<Decimal> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.sum / Decimal::from(self.buffer.len()))
        }
    }

    pub fn period(&self) -> usize {
        self.len
    }
}

impl Average for MovingAverage {
    fn next(&mut self, tick: Tick) -> Option<Decimal> {
        self.sum += tick.price;
        self.buffer.push_back(tick.price);

        if self.buffer.len() > self.len {
            if let Some(removed) = self.buffer.pop_front() {
                self.sum -= removed;
            }
        }

        self.value()
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.sum = Decimal::ZERO;
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn name(&self) -> &'static str {
        "moving"
    }
}
