use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tickavg_core::{Clock, Tick};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::FeedConfig;

/// Synthetic tick source: `start_price`, `start_price + step`, ... sent every
/// `interval_ms`, stamped with `clock`.
///
/// The channel closes after `config.ticks` ticks (never when it is 0), when
/// `cancel` fires, or when the receiver is dropped.
pub fn spawn_feed(
    config: FeedConfig,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
) -> mpsc::Receiver<Tick> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(config.interval_ms));
        let mut sent = 0u64;

        info!(
            ticks = config.ticks,
            interval_ms = config.interval_ms,
            start_price = %config.start_price,
            "Feed started"
        );

        while config.ticks == 0 || sent < config.ticks {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let tick = Tick::new(price_at(&config, sent), clock.now());
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = tx.send(tick) => {
                    if result.is_err() {
                        debug!("Feed receiver dropped");
                        break;
                    }
                }
            }

            sent += 1;
        }

        info!(sent, "Feed finished");
    });

    rx
}

/// Price of the `index`-th tick (0-based) the feed sends.
pub fn price_at(config: &FeedConfig, index: u64) -> Decimal {
    config.start_price + config.step * Decimal::from(index)
}
