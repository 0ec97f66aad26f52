//! Outcome accounting: counters and the failure log
//!
//! Success increments `stat:processed` and `stat:processed:{job}`; failure
//! increments `stat:failed` and `stat:failed:{job}` and appends a
//! [`FailurePayload`] to the failure log. Every write is attempted even when
//! an earlier one fails; failed writes are logged and the first error is
//! returned to the caller.

use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

use super::runner::Failure;
use crate::handlers::{FailurePayload, JobRecord};
use crate::keys::KeyNamer;
use crate::store::{ListStore, StoreError};

#[derive(Debug, Error)]
pub enum AccountingError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AccountingError>;

/// Processed/failed counters, global or for one job name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub processed: i64,
    pub failed: i64,
}

#[derive(Clone)]
pub struct Accounting {
    store: Arc<dyn ListStore>,
    keys: KeyNamer,
}

impl Accounting {
    pub fn new(store: Arc<dyn ListStore>, keys: KeyNamer) -> Self {
        Self { store, keys }
    }

    pub async fn record_success(&self, queue: &str, record: &JobRecord) -> Result<()> {
        let mut first_error = None;
        self.increment_all(
            &[self.keys.processed(), self.keys.processed_for(&record.class)],
            &mut first_error,
        )
        .await;

        debug!(queue, class = %record.class, "Recorded success");
        first_error.map_or(Ok(()), Err)
    }

    pub async fn record_failure(
        &self,
        queue: &str,
        record: &JobRecord,
        body: &Value,
        failure: &Failure,
    ) -> Result<()> {
        let mut first_error = None;
        self.increment_all(
            &[self.keys.failed(), self.keys.failed_for(&record.class)],
            &mut first_error,
        )
        .await;

        let payload = FailurePayload::new(
            queue,
            record,
            body,
            failure.exception(),
            failure.message(),
            failure.backtrace(),
        );
        let log_key = self.keys.failure_log();

        match serde_json::to_string(&payload) {
            Ok(value) => {
                if let Err(e) = self.store.push_tail(&log_key, value).await {
                    error!(key = %log_key, error = %e, "Failed to append failure payload");
                    keep_first(&mut first_error, e);
                }
            }
            Err(e) => {
                error!(key = %log_key, error = %e, "Failed to serialize failure payload");
                keep_first(&mut first_error, e);
            }
        }

        debug!(queue, class = %record.class, exception = failure.exception(), "Recorded failure");
        first_error.map_or(Ok(()), Err)
    }

    async fn increment_all(&self, keys: &[String], first_error: &mut Option<AccountingError>) {
        for key in keys {
            if let Err(e) = self.store.increment(key).await {
                error!(key = %key, error = %e, "Failed to increment counter");
                keep_first(first_error, e);
            }
        }
    }

    /// Counters for one job name, or the global ones when `job` is `None`
    pub async fn stats(&self, job: Option<&str>) -> Result<Stats> {
        let (processed, failed) = match job {
            Some(job) => (self.keys.processed_for(job), self.keys.failed_for(job)),
            None => (self.keys.processed(), self.keys.failed()),
        };

        Ok(Stats {
            processed: self.store.counter(&processed).await?,
            failed: self.store.counter(&failed).await?,
        })
    }

    pub async fn failure_count(&self) -> Result<usize> {
        Ok(self.store.len(&self.keys.failure_log()).await?)
    }

    /// Read failure payloads oldest first
    pub async fn failures(&self, start: usize, limit: usize) -> Result<Vec<FailurePayload>> {
        let raw = self
            .store
            .range(&self.keys.failure_log(), start, limit)
            .await?;

        raw.iter()
            .map(|entry| serde_json::from_str(entry).map_err(AccountingError::from))
            .collect()
    }
}

fn keep_first(slot: &mut Option<AccountingError>, err: impl Into<AccountingError>) {
    if slot.is_none() {
        *slot = Some(err.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{JobError, RegistryError, MISSING_JOB_EXCEPTION};
    use crate::store::MemoryStore;
    use serde_json::json;

    fn create_accounting() -> (Accounting, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Accounting::new(store.clone(), KeyNamer::default()), store)
    }

    #[tokio::test]
    async fn test_record_success() {
        let (accounting, store) = create_accounting();
        let record = JobRecord::new("send_email", vec![json!("a@example.com")]);

        accounting.record_success("mail", &record).await.unwrap();

        assert_eq!(store.counter("resque:stat:processed").await.unwrap(), 1);
        assert_eq!(store.counter("resque:stat:processed:send_email").await.unwrap(), 1);
        assert_eq!(store.counter("resque:stat:failed").await.unwrap(), 0);
        assert_eq!(store.len("resque:failed").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_record_failure() {
        let (accounting, store) = create_accounting();
        let body = json!({"class": "fail", "args": [1], "id": "abc-123"});
        let record = JobRecord::from_body(&body).unwrap();
        let failure = Failure::Job(JobError::new("RuntimeError", "boom"));

        accounting.record_failure("queue", &record, &body, &failure).await.unwrap();

        assert_eq!(store.counter("resque:stat:failed").await.unwrap(), 1);
        assert_eq!(store.counter("resque:stat:failed:fail").await.unwrap(), 1);
        assert_eq!(store.counter("resque:stat:processed").await.unwrap(), 0);

        let failures = accounting.failures(0, 10).await.unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].worker, "fail");
        assert_eq!(failures[0].queue, "queue");
        assert_eq!(failures[0].payload, body);
        assert_eq!(failures[0].exception, "RuntimeError");
        assert_eq!(failures[0].error, "boom");
        assert!(!failures[0].backtrace.is_empty());
    }

    #[tokio::test]
    async fn test_record_missing_job_failure() {
        let (accounting, _store) = create_accounting();
        let record = JobRecord::new("unknown_job", vec![]);
        let failure = Failure::missing_job(RegistryError::MissingJob {
            queue: "mail".to_string(),
            class: "unknown_job".to_string(),
        });

        accounting
            .record_failure("mail", &record, &json!({"class": "unknown_job"}), &failure)
            .await
            .unwrap();

        let failures = accounting.failures(0, 10).await.unwrap();
        assert_eq!(failures[0].exception, MISSING_JOB_EXCEPTION);
        assert!(failures[0].error.contains("unknown_job"));
    }

    #[tokio::test]
    async fn test_stats() {
        let (accounting, _store) = create_accounting();
        let a = JobRecord::new("a", vec![]);
        let b = JobRecord::new("b", vec![]);

        accounting.record_success("q", &a).await.unwrap();
        accounting.record_success("q", &a).await.unwrap();
        accounting
            .record_failure("q", &b, &json!({"class": "b"}), &Failure::Job(JobError::new("E", "m")))
            .await
            .unwrap();

        assert_eq!(accounting.stats(None).await.unwrap(), Stats { processed: 2, failed: 1 });
        assert_eq!(accounting.stats(Some("a")).await.unwrap(), Stats { processed: 2, failed: 0 });
        assert_eq!(accounting.stats(Some("b")).await.unwrap(), Stats { processed: 0, failed: 1 });
        assert_eq!(accounting.failure_count().await.unwrap(), 1);
    }
}
