//! Payment status polling for a mounted page.
//!
//! Fetches run on a fixed interval until the snapshot is terminal, the
//! handler asks to stop, or the [`PollerHandle`] is dropped. A fetch that
//! resolves after teardown is discarded without reaching the handler.

use super::status_source::StatusSource;
use crate::config::PollingSettings;
use crate::models::PaymentStatusSnapshot;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Continue,
    Stop,
}

#[async_trait]
pub trait SnapshotHandler: Send + Sync {
    async fn on_snapshot(&self, snapshot: PaymentStatusSnapshot) -> Control;
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct StatusPoller {
    source: Arc<dyn StatusSource>,
    code: String,
    interval: Duration,
    request_timeout: Duration,
    in_flight: AtomicBool,
    cancel: CancellationToken,
}

impl StatusPoller {
    pub fn new(
        source: Arc<dyn StatusSource>,
        code: impl Into<String>,
        settings: &PollingSettings,
    ) -> Self {
        Self {
            source,
            code: code.into(),
            interval: settings.interval(),
            request_timeout: settings.request_timeout(),
            in_flight: AtomicBool::new(false),
            cancel: CancellationToken::new(),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    fn begin(&self) -> Option<InFlightGuard<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(code = %self.code, "Fetch already in flight, skipping");
            return None;
        }
        Some(InFlightGuard(&self.in_flight))
    }

    /// One fetch. `None` when skipped, failed, timed out or torn down.
    pub async fn poll_once(&self) -> Option<PaymentStatusSnapshot> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let _guard = self.begin()?;
        self.fetch().await
    }

    async fn fetch(&self) -> Option<PaymentStatusSnapshot> {
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            result = tokio::time::timeout(self.request_timeout, self.source.fetch(&self.code)) => result,
        };

        if self.cancel.is_cancelled() {
            tracing::debug!(code = %self.code, "Discarding fetch completed after teardown");
            return None;
        }

        match result {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(e)) => {
                tracing::warn!(code = %self.code, error = %e, "Payment status fetch failed");
                None
            }
            Err(_) => {
                tracing::debug!(code = %self.code, "Payment status fetch timed out");
                None
            }
        }
    }

    /// Fetch once and hand the snapshot over. Returns whether polling should go on.
    /// The in-flight flag covers the handler too, so snapshots reach it one at a time.
    async fn cycle(&self, handler: &dyn SnapshotHandler) -> Control {
        if self.cancel.is_cancelled() {
            return Control::Stop;
        }
        let Some(_guard) = self.begin() else {
            return Control::Continue;
        };
        let snapshot = match self.fetch().await {
            Some(snapshot) => snapshot,
            None => return Control::Continue,
        };

        let terminal = snapshot.is_terminal();
        let control = handler.on_snapshot(snapshot).await;

        if terminal || control == Control::Stop {
            tracing::info!(code = %self.code, terminal, "Polling stopped");
            self.cancel.cancel();
            return Control::Stop;
        }
        Control::Continue
    }

    pub fn spawn(self: Arc<Self>, handler: Arc<dyn SnapshotHandler>) -> PollerHandle {
        let poller = self.clone();
        let loop_handler = handler.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poller.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = poller.cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                if poller.cycle(loop_handler.as_ref()).await == Control::Stop {
                    break;
                }
            }

            tracing::debug!(code = %poller.code, "Poller exited");
        });

        PollerHandle {
            poller: self,
            handler,
            task,
        }
    }
}

/// Owning handle of a running poller. Dropping it tears the poller down.
pub struct PollerHandle {
    poller: Arc<StatusPoller>,
    handler: Arc<dyn SnapshotHandler>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Manual refresh. Skipped while a scheduled fetch is in flight.
    pub async fn refresh(&self) -> Control {
        if self.poller.is_cancelled() {
            return Control::Stop;
        }
        self.poller.cycle(self.handler.as_ref()).await
    }

    pub fn is_running(&self) -> bool {
        !self.poller.is_cancelled() && !self.task.is_finished()
    }

    pub fn stop(&self) {
        self.poller.cancel();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.poller.cancel();
    }
}
