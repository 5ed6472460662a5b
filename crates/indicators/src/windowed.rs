use crate::Average;
use chrono::Duration;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tickavg_core::{Clock, Tick};
use tracing::trace;

/// Trailing mean of the prices whose age is at most `duration`.
///
/// Age is measured against the injected [`Clock`], sampled once per tick.
/// A tick whose arrival evicts the entire window (the gap since the previous
/// tick is longer than `duration`) produces no value.
#[derive(Debug, Clone)]
pub struct WindowedAverage<C> {
    duration: Duration,
    clock: C,
    buffer: VecDeque<Tick>,
    sum: Decimal,
}

impl<C: Clock> WindowedAverage<C> {
    /// # Panics
    ///
    /// Panics if `duration` is not positive.
    pub fn new(duration: Duration, clock: C) -> Self {
        assert!(duration > Duration::zero(), "window duration must be > 0");
        Self {
            duration,
            clock,
            buffer: VecDeque::new(),
            sum: Decimal::ZERO,
        }
    }

    pub fn value(&self) -> Option<Decimal> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.sum / Decimal::from(self.buffer.len()))
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Drop ticks older than the window relative to `now`, returning how many
    /// were removed.
    fn evict(&mut self, now: chrono::DateTime<chrono::Utc>) -> usize {
        let mut evicted = 0;
        while let Some(head) = self.buffer.front() {
            if now - head.timestamp <= self.duration {
                break;
            }
            self.sum -= head.price;
            self.buffer.pop_front();
            evicted += 1;
        }
        evicted
    }
}

impl<C: Clock> Average for WindowedAverage<C> {
    fn next(&mut self, tick: Tick) -> Option<Decimal> {
        self.sum += tick.price;
        self.buffer.push_back(tick);

        let now = self.clock.now();
        let evicted = self.evict(now);
        trace!(%now, evicted, retained = self.buffer.len(), "Windowed eviction");

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
        "windowed"
    }
}
