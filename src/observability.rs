//! Observability: tracing setup and in-process worker metrics

use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, TelemetryConfig};

/// Install the global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured filter. Calling this more
/// than once is a no-op.
pub fn init_tracing(config: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let _ = match config.log_format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().with_target(false).try_init(),
    };
}

/// Counters describing what this worker process has done
///
/// These are per-process and reset on restart; the durable statistics live
/// in the store.
#[derive(Debug, Default)]
pub struct WorkerMetrics {
    sweeps: AtomicU64,
    processed: AtomicU64,
    failed: AtomicU64,
    idle_polls: AtomicU64,
}

impl WorkerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sweep_completed(&self) {
        self.sweeps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatched(&self, success: bool) {
        let counter = if success { &self.processed } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(success, "Metric incremented");
    }

    pub fn idle_poll(&self) {
        self.idle_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sweeps: self.sweeps.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            idle_polls: self.idle_polls.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub sweeps: u64,
    pub processed: u64,
    pub failed: u64,
    pub idle_polls: u64,
}
