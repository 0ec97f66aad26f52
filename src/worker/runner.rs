//! Dispatcher - turns one raw queue entry into a handler invocation
//!
//! Flow for `perform(queue, raw)`:
//! 1. Decode the record (malformed input is a protocol error, nothing is recorded)
//! 2. Resolve the handler for (queue, class); a miss is recorded as a failure
//! 3. Run the handler on the calling task, catching panics
//! 4. Record exactly one of success or failure

use futures::FutureExt;
use serde_json::Value;
use std::backtrace::Backtrace;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::accounting::{Accounting, AccountingError};
use crate::handlers::{JobError, JobRecord, JobRegistry, RegistryError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Malformed job record on queue {queue}: {source}")]
    Protocol {
        queue: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to record outcome of {class} on queue {queue}: {source}")]
    Accounting {
        queue: String,
        class: String,
        #[source]
        source: AccountingError,
    },
}

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Why a dispatch failed
#[derive(Debug)]
pub enum Failure {
    /// No handler registered for the record's class on this queue
    MissingJob { error: RegistryError, trace: String },
    /// The handler returned an error or panicked
    Job(JobError),
}

impl Failure {
    pub fn missing_job(error: RegistryError) -> Self {
        Failure::MissingJob {
            error,
            trace: Backtrace::force_capture().to_string(),
        }
    }

    /// Error class name recorded in the failure log
    pub fn exception(&self) -> &str {
        match self {
            Failure::MissingJob { error, .. } => error.exception(),
            Failure::Job(err) => err.kind(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            Failure::MissingJob { error, .. } => error.to_string(),
            Failure::Job(err) => err.message().to_string(),
        }
    }

    pub fn backtrace(&self) -> &str {
        match self {
            Failure::MissingJob { trace, .. } => trace,
            Failure::Job(err) => err.backtrace(),
        }
    }

    pub fn is_missing_job(&self) -> bool {
        matches!(self, Failure::MissingJob { .. })
    }
}

/// Result of running one record
#[derive(Debug)]
pub enum Outcome {
    Success,
    Failed(Failure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Success => None,
            Outcome::Failed(failure) => Some(failure),
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    accounting: Accounting,
}

impl Dispatcher {
    pub fn new(registry: Arc<JobRegistry>, accounting: Accounting) -> Self {
        Self {
            registry,
            accounting,
        }
    }

    pub fn accounting(&self) -> &Accounting {
        &self.accounting
    }

    /// Decode, run and record one raw queue entry
    pub async fn perform(&self, queue: &str, raw: &str) -> Result<Outcome> {
        let protocol = |source| DispatchError::Protocol {
            queue: queue.to_string(),
            source,
        };
        let body: Value = serde_json::from_str(raw).map_err(protocol)?;
        let record = JobRecord::from_body(&body).map_err(protocol)?;

        let outcome = self.execute(queue, &record).await;

        let recorded = match &outcome {
            Outcome::Success => self.accounting.record_success(queue, &record).await,
            Outcome::Failed(failure) => {
                warn!(
                    queue,
                    class = %record.class,
                    exception = failure.exception(),
                    error = %failure.message(),
                    "Job failed"
                );
                self.accounting.record_failure(queue, &record, &body, failure).await
            }
        };

        recorded.map_err(|source| DispatchError::Accounting {
            queue: queue.to_string(),
            class: record.class.clone(),
            source,
        })?;

        Ok(outcome)
    }

    /// Resolve and run the handler for a decoded record, without recording
    pub async fn execute(&self, queue: &str, record: &JobRecord) -> Outcome {
        let handler = match self.registry.resolve(queue, &record.class) {
            Ok(handler) => handler,
            Err(error) => return Outcome::Failed(Failure::missing_job(error)),
        };

        debug!(queue, class = %record.class, args = record.args.len(), "Running job");

        match AssertUnwindSafe(handler.perform(record.args.clone()))
            .catch_unwind()
            .await
        {
            Ok(Ok(())) => Outcome::Success,
            Ok(Err(err)) => Outcome::Failed(Failure::Job(err)),
            Err(payload) => Outcome::Failed(Failure::Job(JobError::from_panic(payload))),
        }
    }
}
