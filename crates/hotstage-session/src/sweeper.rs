//! Background eviction of expired sessions.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::ExpiringSessionStore;
use crate::ttl::unix_now;

/// A second's worth of tokens handed to the deletion worker.
type Batch = (i64, Vec<String>);

/// Handle to the running sweeper tasks.
///
/// The ticker walks a logical clock forward one sweep interval per tick and
/// forwards each due expiry bucket to a single deletion worker over a bounded
/// queue. [`close`](Self::close) stops both tasks and waits for them; dropping
/// the handle only signals them to stop.
pub struct Sweeper {
    cancel: CancellationToken,
    ticker: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl Sweeper {
    /// Stop the ticker and the worker and wait for both to exit.
    pub async fn close(mut self) {
        self.cancel.cancel();
        if let Err(e) = (&mut self.ticker).await {
            warn!(error = %e, "Sweeper ticker exited abnormally");
        }
        if let Err(e) = (&mut self.worker).await {
            warn!(error = %e, "Sweeper worker exited abnormally");
        }
        info!("Session sweeper stopped");
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl ExpiringSessionStore {
    /// Start the background sweeper for this store.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn_sweeper(&self) -> Sweeper {
        let cancel = CancellationToken::new();
        let (tx, rx) = mpsc::channel(self.config().queue_capacity.max(1));

        let ticker = tokio::spawn(run_ticker(
            self.clone(),
            self.config().sweep_interval,
            tx,
            cancel.clone(),
        ));
        let worker = tokio::spawn(run_worker(self.clone(), rx, cancel.clone()));

        info!(
            interval_ms = self.config().sweep_interval.as_millis() as u64,
            "Session sweeper started"
        );

        Sweeper {
            cancel,
            ticker,
            worker,
        }
    }
}

async fn run_ticker(
    store: ExpiringSessionStore,
    period: Duration,
    tx: mpsc::Sender<Batch>,
    cancel: CancellationToken,
) {
    let period = if period.is_zero() {
        Duration::from_secs(1)
    } else {
        period
    };
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    // Logical clock in milliseconds; seconds up to `swept` have been handled
    let start = unix_now();
    let mut clock_ms: i128 = i128::from(start) * 1000;
    let mut swept = start;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        clock_ms += period.as_millis() as i128;
        let due = (clock_ms / 1000) as i64;

        while swept < due {
            swept += 1;
            let Some(tokens) = store.expiring_at(swept) else {
                continue;
            };
            tokio::select! {
                _ = cancel.cancelled() => return,
                sent = tx.send((swept, tokens)) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

async fn run_worker(
    store: ExpiringSessionStore,
    mut rx: mpsc::Receiver<Batch>,
    cancel: CancellationToken,
) {
    loop {
        let (at, tokens) = tokio::select! {
            _ = cancel.cancelled() => break,
            batch = rx.recv() => match batch {
                Some(batch) => batch,
                None => break,
            },
        };

        let removed = store.delete_expired(at, &tokens);
        if removed > 0 {
            debug!(at, removed, "Swept expired sessions");
        }
    }
}
