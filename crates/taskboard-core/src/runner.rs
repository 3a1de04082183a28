//! Background loop that drives a [`Cleanup`] on a fixed interval.
//!
//! The wait for the next tick is the only point raced against the stop
//! signal. A cleanup pass that has already begun always runs to completion,
//! so `stop` never leaves an eviction half-applied. Passes never overlap.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::retention::Cleanup;

/// How long [`PeriodicRunner::stop`] waits for an in-flight pass by default.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct PeriodicRunner<C> {
    cleanup: Arc<C>,
    interval: Duration,
    stop_timeout: Duration,
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl<C> std::fmt::Debug for PeriodicRunner<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicRunner")
            .field("interval", &self.interval)
            .field("stop_timeout", &self.stop_timeout)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl<C: Cleanup> PeriodicRunner<C> {
    pub fn new(cleanup: Arc<C>, interval: Duration) -> Self {
        let (stop_tx, _stop_rx) = watch::channel(false);
        Self {
            cleanup,
            interval,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            stop_tx,
            handle: None,
        }
    }

    /// Bound on how long `stop` waits for a pass that is already running
    /// before aborting it.
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Spawn the loop. The first pass runs after one full interval.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            warn!("periodic cleanup already started");
            return;
        }
        self.stop_tx.send_replace(false);
        let stop_rx = self.stop_tx.subscribe();
        let cleanup = Arc::clone(&self.cleanup);
        let interval = self.interval;
        let span = info_span!("periodic_cleanup", interval_secs = interval.as_secs());
        self.handle = Some(tokio::spawn(
            run_loop(cleanup, interval, stop_rx).instrument(span),
        ));
        info!(interval_secs = interval.as_secs(), "periodic cleanup started");
    }

    /// Signal the loop to exit and wait for it. Safe to call without a prior
    /// [`start`](Self::start), and more than once.
    ///
    /// A pass still running after the stop timeout is aborted.
    pub async fn stop(&mut self) {
        self.stop_tx.send_replace(true);
        let Some(handle) = self.handle.take() else {
            return;
        };
        let abort = handle.abort_handle();
        match tokio::time::timeout(self.stop_timeout, handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "periodic cleanup task ended abnormally"),
            Err(_) => {
                abort.abort();
                warn!(
                    timeout_secs = self.stop_timeout.as_secs(),
                    "periodic cleanup pass did not finish in time; aborted"
                );
            }
        }
        info!("periodic cleanup stopped");
    }
}

async fn run_loop<C: Cleanup>(cleanup: Arc<C>, interval: Duration, mut stop_rx: watch::Receiver<bool>) {
    loop {
        tokio::select! {
            // Only `stop` publishes after subscription; a dropped sender also ends the loop.
            changed = stop_rx.changed() => {
                if changed.is_err() {
                    warn!("periodic cleanup lost its stop signal; exiting");
                }
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match cleanup.run_cleanup().await {
            Ok(report) => info!(
                deleted_by_ttl = report.deleted_by_ttl,
                deleted_by_count = report.deleted_by_count,
                "periodic cleanup pass finished"
            ),
            Err(e) => error!(error = %e, "error during periodic cleanup"),
        }
    }
}
