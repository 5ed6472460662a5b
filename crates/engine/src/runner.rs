use rust_decimal::Decimal;
use tickavg_core::Tick;
use tickavg_indicators::Average;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::EngineError;

/// Capacity of the output channel.
///
/// tokio channels need room for at least one value; with a single slot the
/// average can run at most one value ahead of its consumer.
pub const OUTPUT_CAPACITY: usize = 1;

/// Why an average task stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The tick source was exhausted and every buffered tick was processed.
    InputClosed,
    /// The cancellation token fired.
    Cancelled,
    /// The consumer dropped the output.
    OutputClosed,
}

/// Counters reported by a finished average task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks_processed: u64,
    pub values_emitted: u64,
    pub exit: ExitReason,
}

/// Drive `average` over `ticks` until the input ends, `cancel` fires, or the
/// consumer goes away.
///
/// Cancellation wins over both receiving a new tick and sending a value: a
/// tick whose value has not been handed to `out` when the token fires is
/// dropped. The output closes when this future returns.
pub async fn run_average<A: Average>(
    mut average: A,
    mut ticks: mpsc::Receiver<Tick>,
    out: mpsc::Sender<Decimal>,
    cancel: CancellationToken,
) -> RunSummary {
    let name = average.name();
    let mut ticks_processed = 0u64;
    let mut values_emitted = 0u64;

    info!(average = name, "Average started");

    let exit = loop {
        let tick = tokio::select! {
            biased;
            () = cancel.cancelled() => break ExitReason::Cancelled,
            tick = ticks.recv() => match tick {
                Some(tick) => tick,
                None => break ExitReason::InputClosed,
            },
        };

        ticks_processed += 1;
        let Some(value) = average.next(tick) else {
            trace!(average = name, "No value for tick");
            continue;
        };
        trace!(average = name, %value, "Average updated");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break ExitReason::Cancelled,
            sent = out.send(value) => {
                if sent.is_err() {
                    debug!(average = name, "Output receiver dropped");
                    break ExitReason::OutputClosed;
                }
                values_emitted += 1;
            }
        }
    };

    info!(
        average = name,
        ticks_processed,
        values_emitted,
        exit = ?exit,
        retained = average.len(),
        "Average stopped"
    );

    RunSummary {
        ticks_processed,
        values_emitted,
        exit,
    }
}

/// Spawn `average` as its own task over `ticks`.
///
/// The task listens on a child of `cancel`: cancelling the parent stops every
/// average spawned from it, while [`AverageStream::cancel`] stops only this
/// one.
pub fn spawn_average<A>(
    average: A,
    ticks: mpsc::Receiver<Tick>,
    cancel: &CancellationToken,
) -> AverageStream
where
    A: Average + 'static,
{
    let (tx, rx) = mpsc::channel(OUTPUT_CAPACITY);
    let cancel = cancel.child_token();
    let task = tokio::spawn(run_average(average, ticks, tx, cancel.clone()));
    AverageStream { rx, cancel, task }
}

/// Output side of a spawned average.
#[derive(Debug)]
pub struct AverageStream {
    rx: mpsc::Receiver<Decimal>,
    cancel: CancellationToken,
    task: JoinHandle<RunSummary>,
}

impl AverageStream {
    /// Receive the next average.
    ///
    /// Returns `None` once the task has stopped, and immediately after
    /// cancellation even if a value is still sitting in the channel.
    pub async fn recv(&mut self) -> Option<Decimal> {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            value = self.rx.recv() => value,
        }
    }

    /// Stop this average.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Close the output, stop the task, and wait for it to finish.
    ///
    /// A task that already ended keeps its exit reason. One still waiting on
    /// a live tick source is cancelled, so this never blocks on the source.
    pub async fn join(self) -> Result<RunSummary, EngineError> {
        let AverageStream { rx, cancel, task } = self;
        drop(rx);
        cancel.cancel();
        task.await.map_err(EngineError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};
    use rust_decimal_macros::dec;
    use tickavg_core::{Clock, MockClock};
    use tickavg_indicators::{ExponentialMovingAverage, MovingAverage, WindowedAverage};

    fn prices() -> Vec<Decimal> {
        vec![dec!(10), dec!(20), dec!(30), dec!(40), dec!(50)]
    }

    fn tick(price: Decimal) -> Tick {
        Tick::new(price, Utc::now())
    }

    async fn collect(stream: &mut AverageStream) -> Vec<Decimal> {
        let mut out = Vec::new();
        while let Some(value) = stream.recv().await {
            out.push(value);
        }
        out
    }

    #[tokio::test]
    async fn test_moving_average_until_input_closes() {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut stream = spawn_average(MovingAverage::new(3), rx, &cancel);

        for price in prices() {
            tx.send(tick(price)).await.unwrap();
        }
        drop(tx);

        assert_eq!(
            collect(&mut stream).await,
            vec![dec!(10), dec!(15), dec!(20), dec!(30), dec!(40)]
        );
        let summary = stream.join().await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                ticks_processed: 5,
                values_emitted: 5,
                exit: ExitReason::InputClosed,
            }
        );
    }

    #[tokio::test]
    async fn test_exponential_average_over_channel() {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut stream = spawn_average(ExponentialMovingAverage::new(3, dec!(0.75)), rx, &cancel);

        for price in prices() {
            tx.send(tick(price)).await.unwrap();
        }
        drop(tx);

        assert_eq!(
            collect(&mut stream).await,
            vec![
                dec!(7.5),
                dec!(16.875),
                dec!(26.71875),
                dec!(36.5625),
                dec!(46.40625)
            ]
        );
    }

    #[tokio::test]
    async fn test_cancel_between_ticks_stops_before_next_tick() {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut stream = spawn_average(ExponentialMovingAverage::new(3, dec!(0.75)), rx, &cancel);

        let mut out = Vec::new();
        for price in &prices()[..3] {
            tx.send(tick(*price)).await.unwrap();
            out.push(stream.recv().await.unwrap());
        }

        cancel.cancel();
        // The task may already be gone; either way the tick must be ignored.
        let _ = tx.send(tick(dec!(40))).await;

        assert_eq!(stream.recv().await, None);
        assert_eq!(out, vec![dec!(7.5), dec!(16.875), dec!(26.71875)]);

        let summary = stream.join().await.unwrap();
        assert_eq!(summary.exit, ExitReason::Cancelled);
        assert_eq!(summary.ticks_processed, 3);
        assert_eq!(summary.values_emitted, 3);
    }

    #[tokio::test]
    async fn test_cancel_at_every_point_yields_prefix() {
        use std::sync::Arc;
        use tickavg_core::AverageConfig;
        use tickavg_indicators::build_average;

        let configs = [
            AverageConfig::Moving { window: 3 },
            AverageConfig::Exponential {
                window: 3,
                alpha: dec!(0.75),
            },
            AverageConfig::Windowed { duration_secs: 60 },
        ];

        for config in &configs {
            let clock: Arc<dyn Clock> = Arc::new(MockClock::new());

            let mut full = Vec::new();
            let mut reference = build_average(config, clock.clone()).unwrap();
            for price in prices() {
                full.extend(reference.next(Tick::new(price, clock.now())));
            }

            for k in 0..=full.len() {
                let (tx, rx) = mpsc::channel(1);
                let cancel = CancellationToken::new();
                let average = build_average(config, clock.clone()).unwrap();
                let mut stream = spawn_average(average, rx, &cancel);

                let mut out = Vec::new();
                for price in &prices()[..k] {
                    tx.send(Tick::new(*price, clock.now())).await.unwrap();
                    out.push(stream.recv().await.unwrap());
                }
                cancel.cancel();
                for price in &prices()[k..] {
                    let _ = tx.send(Tick::new(*price, clock.now())).await;
                }
                while let Some(value) = stream.recv().await {
                    out.push(value);
                }

                assert_eq!(out, full[..k], "{} cancelled after {k} ticks", config.name());
                assert_eq!(stream.join().await.unwrap().exit, ExitReason::Cancelled);
            }
        }
    }

    #[tokio::test]
    async fn test_consumer_cancel_drops_buffered_values() {
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut stream = spawn_average(MovingAverage::new(3), rx, &cancel);

        for price in prices() {
            tx.send(tick(price)).await.unwrap();
        }
        drop(tx);

        let mut out = Vec::new();
        while let Some(value) = stream.recv().await {
            out.push(value);
            if out.len() == 3 {
                stream.cancel();
            }
        }

        assert_eq!(out, vec![dec!(10), dec!(15), dec!(20)]);
        assert_eq!(stream.join().await.unwrap().exit, ExitReason::Cancelled);
    }

    #[tokio::test]
    async fn test_windowed_average_with_mock_clock() {
        let clock = MockClock::new();
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut stream = spawn_average(
            WindowedAverage::new(Duration::minutes(1), clock.clone()),
            rx,
            &cancel,
        );

        // Each tick reaches the average one gap after it was stamped.
        let gaps = [20, 20, 30, 40, 0];
        let mut out = Vec::new();
        for (price, gap) in prices().into_iter().zip(gaps) {
            let tick = Tick::new(price, clock.now());
            clock.advance(Duration::seconds(gap));
            tx.send(tick).await.unwrap();
            out.push(stream.recv().await.unwrap());
        }

        assert_eq!(out, vec![dec!(10), dec!(15), dec!(25), dec!(40), dec!(45)]);
    }

    #[tokio::test]
    async fn test_windowed_average_skips_stale_ticks() {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let clock = MockClock::at(start + Duration::seconds(100));
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let mut stream = spawn_average(
            WindowedAverage::new(Duration::seconds(10), clock),
            rx,
            &cancel,
        );

        for (secs, price) in [(60, dec!(1)), (95, dec!(2)), (97, dec!(4))] {
            tx.send(Tick::new(price, start + Duration::seconds(secs)))
                .await
                .unwrap();
        }
        drop(tx);

        assert_eq!(collect(&mut stream).await, vec![dec!(2), dec!(3)]);
        let summary = stream.join().await.unwrap();
        assert_eq!(summary.ticks_processed, 3);
        assert_eq!(summary.values_emitted, 2);
    }

    #[tokio::test]
    async fn test_parent_token_stops_child_averages() {
        let (_tx_a, rx_a) = mpsc::channel::<Tick>(1);
        let (_tx_b, rx_b) = mpsc::channel::<Tick>(1);
        let cancel = CancellationToken::new();
        let mut a = spawn_average(MovingAverage::new(2), rx_a, &cancel);
        let mut b = spawn_average(MovingAverage::new(5), rx_b, &cancel);

        cancel.cancel();

        assert_eq!(a.recv().await, None);
        assert_eq!(b.recv().await, None);
        assert_eq!(a.join().await.unwrap().exit, ExitReason::Cancelled);
        assert_eq!(b.join().await.unwrap().exit, ExitReason::Cancelled);
    }

    #[tokio::test]
    async fn test_child_cancel_leaves_siblings_running() {
        let (tx_a, rx_a) = mpsc::channel(1);
        let (tx_b, rx_b) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut a = spawn_average(MovingAverage::new(2), rx_a, &cancel);
        let mut b = spawn_average(MovingAverage::new(2), rx_b, &cancel);

        a.cancel();
        assert_eq!(a.recv().await, None);
        let _ = tx_a.send(tick(dec!(1))).await;

        tx_b.send(tick(dec!(6))).await.unwrap();
        assert_eq!(b.recv().await, Some(dec!(6)));
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_dropped_output_stops_task() {
        let (tx, rx) = mpsc::channel(8);
        let (out_tx, out_rx) = mpsc::channel(OUTPUT_CAPACITY);
        drop(out_rx);

        for price in prices() {
            tx.send(tick(price)).await.unwrap();
        }

        let summary =
            run_average(MovingAverage::new(2), rx, out_tx, CancellationToken::new()).await;
        assert_eq!(
            summary,
            RunSummary {
                ticks_processed: 1,
                values_emitted: 0,
                exit: ExitReason::OutputClosed,
            }
        );
        drop(tx);
    }

    #[tokio::test]
    async fn test_join_returns_while_source_is_open() {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let mut stream = spawn_average(MovingAverage::new(2), rx, &cancel);

        tx.send(tick(dec!(3))).await.unwrap();
        assert_eq!(stream.recv().await, Some(dec!(3)));

        let summary = stream.join().await.unwrap();
        assert_eq!(summary.exit, ExitReason::Cancelled);
        assert_eq!(summary.ticks_processed, 1);
        // Only this average was stopped.
        assert!(!cancel.is_cancelled());
        drop(tx);
    }
}
