//! Worker - round-robin poll loop over every registered queue
//!
//! Each sweep pops at most one record from every queue that has a registered
//! job and dispatches it on the current task. Between sweeps the worker sleeps
//! for the configured interval. A slow handler delays the whole sweep.

pub mod accounting;
pub mod runner;

pub use accounting::{Accounting, AccountingError, Stats};
pub use runner::{DispatchError, Dispatcher, Failure, Outcome};

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::handlers::JobRegistry;
use crate::keys::KeyNamer;
use crate::observability::WorkerMetrics;
use crate::store::{ListStore, StoreError};

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Failed to poll queue {queue}: {source}")]
    Poll {
        queue: String,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

pub type Result<T> = std::result::Result<T, WorkerError>;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Pause between sweeps
    pub interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
        }
    }
}

pub struct Worker {
    store: Arc<dyn ListStore>,
    keys: KeyNamer,
    registry: Arc<JobRegistry>,
    dispatcher: Dispatcher,
    config: WorkerConfig,
    metrics: Arc<WorkerMetrics>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn ListStore>,
        keys: KeyNamer,
        registry: JobRegistry,
        config: WorkerConfig,
    ) -> Self {
        let registry = Arc::new(registry);
        let accounting = Accounting::new(store.clone(), keys.clone());
        let dispatcher = Dispatcher::new(registry.clone(), accounting);

        Self {
            store,
            keys,
            registry,
            dispatcher,
            config,
            metrics: Arc::new(WorkerMetrics::new()),
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn metrics(&self) -> Arc<WorkerMetrics> {
        self.metrics.clone()
    }

    /// One pass over all registered queues, returning how many records were dispatched
    pub async fn sweep(&self) -> Result<usize> {
        self.sweep_until(None).await
    }

    async fn sweep_until(&self, shutdown: Option<&watch::Receiver<bool>>) -> Result<usize> {
        let mut dispatched = 0;

        for queue in self.registry.queues() {
            if shutdown.is_some_and(|rx| *rx.borrow()) {
                debug!(dispatched, "Shutdown requested mid-sweep");
                return Ok(dispatched);
            }

            let key = self.keys.queue(queue);
            let raw = self
                .store
                .pop_head(&key)
                .await
                .map_err(|source| WorkerError::Poll {
                    queue: queue.to_string(),
                    source,
                })?;

            let Some(raw) = raw else {
                self.metrics.idle_poll();
                continue;
            };

            let outcome = match self.dispatcher.perform(queue, &raw).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(queue, raw = %raw, error = %e, "Dispatch aborted");
                    return Err(e.into());
                }
            };

            self.metrics.dispatched(outcome.is_success());
            dispatched += 1;
        }

        // Only full passes count as sweeps
        self.metrics.sweep_completed();
        Ok(dispatched)
    }

    /// Poll until `shutdown` becomes true (or its sender is dropped)
    ///
    /// Protocol and store errors stop the loop and are returned; job failures
    /// never do.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let queues: Vec<&str> = self.registry.queues().collect();
        info!(
            ?queues,
            interval_ms = self.config.interval.as_millis() as u64,
            "Worker started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let dispatched = self.sweep_until(Some(&shutdown)).await?;
            debug!(dispatched, "Sweep finished");

            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("Shutdown sender dropped");
                        break;
                    }
                }
            }
        }

        let snapshot = self.metrics.snapshot();
        info!(
            sweeps = snapshot.sweeps,
            processed = snapshot.processed,
            failed = snapshot.failed,
            "Worker stopped"
        );
        Ok(())
    }
}
