use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tickavg_core::AverageConfig;

/// Settings for the `run` command, loaded from TOML.
///
/// Every section is optional; missing values fall back to the demo defaults
/// (ten ticks priced 1..=10, 100 ms apart, EMA with alpha 0.1 over 10 ticks).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub average: AverageConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Number of ticks to send; 0 runs until cancelled.
    pub ticks: u64,
    pub interval_ms: u64,
    pub start_price: Decimal,
    pub step: Decimal,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ticks: 10,
            interval_ms: 100,
            start_price: Decimal::ONE,
            step: Decimal::ONE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Decimal places shown for each average.
    pub decimals: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { decimals: 4 }
    }
}

impl AppConfig {
    /// Load from `path`, or use defaults when no file is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                Self::parse(&raw).with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => Self::default(),
        };
        Ok(config)
    }

    /// Parse TOML without validating; flags may still override bad values.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(raw)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.average
            .validate()
            .context("average settings are invalid")?;
        if self.feed.interval_ms == 0 {
            anyhow::bail!("feed.interval_ms must be > 0");
        }
        Ok(())
    }
}
