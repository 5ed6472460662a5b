pub mod ema;
pub mod sma;
pub mod windowed;

use std::sync::Arc;

use rust_decimal::Decimal;
use tickavg_core::{window_duration, AverageConfig, Clock, ConfigError, Tick};

pub use ema::ExponentialMovingAverage;
pub use sma::MovingAverage;
pub use windowed::WindowedAverage;

/// Trait for streaming (incremental) averages.
/// Feed one tick at a time; the average maintains its window and running
/// aggregate internally.
pub trait Average: Send + Sync {
    /// Process the next tick and return the updated average, if one is
    /// produced for this tick.
    fn next(&mut self, tick: Tick) -> Option<Decimal>;

    /// Reset the average to its initial state.
    fn reset(&mut self);

    /// Number of observations currently retained in the window.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short name used in logs.
    fn name(&self) -> &'static str;
}

impl<A: Average + ?Sized> Average for Box<A> {
    fn next(&mut self, tick: Tick) -> Option<Decimal> {
        (**self).next(tick)
    }

    fn reset(&mut self) {
        (**self).reset()
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// Build the average described by `config`.
///
/// Parameters are validated first, so the constructors' preconditions
/// always hold for averages built here. Only the windowed average uses
/// `clock`.
pub fn build_average(
    config: &AverageConfig,
    clock: Arc<dyn Clock>,
) -> Result<Box<dyn Average>, ConfigError> {
    config.validate()?;
    let average: Box<dyn Average> = match *config {
        AverageConfig::Moving { window } => Box::new(MovingAverage::new(window)),
        AverageConfig::Exponential { window, alpha } => {
            Box::new(ExponentialMovingAverage::new(window, alpha))
        }
        AverageConfig::Windowed { duration_secs } => {
            Box::new(WindowedAverage::new(window_duration(duration_secs)?, clock))
        }
    };
    Ok(average)
}
