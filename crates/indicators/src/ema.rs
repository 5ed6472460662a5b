use crate::Average;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tickavg_core::Tick;

/// Exponential Moving Average bounded to the last `N` prices.
///
/// Uses the standard recurrence `ema = alpha * price + (1 - alpha) * ema`,
/// seeded with `alpha * price` on the first tick. Once more than `N` prices
/// have been seen, the contribution of the price leaving the window is
/// removed before the recurrence is applied:
///
/// ```text
/// ema -= alpha * evicted * (1 - alpha)^(N - 1)
/// ```
///
/// The correction assumes the evicted price carries its steady-state weight,
/// so the result is an approximation of a truncated EMA. Outputs depend on
/// this exact formula.
#[derive(Debug, Clone)]
pub struct ExponentialMovingAverage {
    len: usize,
    alpha: Decimal,
    /// `1 - alpha`.
    decay: Decimal,
    /// `(1 - alpha)^(N - 1)`, weight of the oldest price in the window.
    removal_factor: Decimal,
    buffer: VecDeque<Decimal>,
    current: Option<Decimal>,
}

impl ExponentialMovingAverage {
    /// # Panics
    ///
    /// Panics if `period` is zero or `alpha` is outside `(0, 1]`.
    pub fn new(period: usize, alpha: Decimal) -> Self {
        assert!(period > 0, "EMA period must be > 0");
        assert!(
            alpha > Decimal::ZERO && alpha <= Decimal::ONE,
            "EMA alpha must be in (0, 1]"
        );
        let decay = Decimal::ONE - alpha;
        Self {
            len: period,
            alpha,
            decay,
            removal_factor: powu(decay, period - 1),
            buffer: VecDeque::with_capacity(period + 1),
            current: None,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        self.current
    }

    pub fn period(&self) -> usize {
        self.len
    }

    pub fn alpha(&self) -> Decimal {
        self.alpha
    }
}

impl Average for ExponentialMovingAverage {
    fn next(&mut self, tick: Tick) -> Option<Decimal> {
        let price = tick.price;
        self.buffer.push_back(price);

        let ema = match self.current {
            None => self.alpha * price,
            Some(mut prev) => {
                if self.buffer.len() > self.len {
                    if let Some(evicted) = self.buffer.pop_front() {
                        prev -= self.alpha * evicted * self.removal_factor;
                    }
                }
                self.alpha * price + self.decay * prev
            }
        };

        self.current = Some(ema);
        self.current
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.current = None;
    }

    fn len(&self) -> usize {
        self.buffer.len()
    }

    fn name(&self) -> &'static str {
        "exponential"
    }
}

/// `base^exp` by repeated multiplication, keeping full decimal precision.
fn powu(base: Decimal, exp: usize) -> Decimal {
    let mut result = Decimal::ONE;
    for _ in 0..exp {
        result *= base;
    }
    result
}
