use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors raised while validating average parameters.
///
/// The averages themselves do not defend against bad parameters; they are
/// checked here before anything is constructed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Window size must be at least 1, got {0}")]
    InvalidWindow(usize),
    #[error("Smoothing factor must be in (0, 1], got {0}")]
    InvalidAlpha(Decimal),
    #[error("Window duration must be a positive number of seconds, got {0}")]
    InvalidDuration(u64),
}

/// Which average to run and with what parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AverageConfig {
    /// Mean of the last `window` prices.
    Moving { window: usize },
    /// Exponentially weighted mean bounded to the last `window` prices.
    Exponential { window: usize, alpha: Decimal },
    /// Mean of the prices seen in the last `duration_secs` seconds.
    Windowed { duration_secs: u64 },
}

impl AverageConfig {
    pub fn name(&self) -> &'static str {
        match self {
            AverageConfig::Moving { .. } => "moving",
            AverageConfig::Exponential { .. } => "exponential",
            AverageConfig::Windowed { .. } => "windowed",
        }
    }

    /// Check the preconditions every average relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            AverageConfig::Moving { window } => validate_window(window),
            AverageConfig::Exponential { window, alpha } => {
                validate_window(window)?;
                if alpha <= Decimal::ZERO || alpha > Decimal::ONE {
                    return Err(ConfigError::InvalidAlpha(alpha));
                }
                Ok(())
            }
            AverageConfig::Windowed { duration_secs } => {
                window_duration(duration_secs).map(|_| ())
            }
        }
    }
}

impl Default for AverageConfig {
    fn default() -> Self {
        AverageConfig::Exponential {
            window: 10,
            alpha: Decimal::new(1, 1),
        }
    }
}

/// Convert a duration in seconds into the chrono type the clock works in.
pub fn window_duration(duration_secs: u64) -> Result<Duration, ConfigError> {
    if duration_secs == 0 {
        return Err(ConfigError::InvalidDuration(duration_secs));
    }
    i64::try_from(duration_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or(ConfigError::InvalidDuration(duration_secs))
}

fn validate_window(window: usize) -> Result<(), ConfigError> {
    if window == 0 {
        Err(ConfigError::InvalidWindow(window))
    } else {
        Ok(())
    }
}
