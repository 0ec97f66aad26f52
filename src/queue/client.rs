use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::handlers::JobRecord;
use crate::keys::KeyNamer;
use crate::store::{ListStore, StoreError};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Producer side: pushes job records onto queues
///
/// There is no acknowledgment; once pushed, a record is picked up by whichever
/// worker pops it first.
#[derive(Clone)]
pub struct QueueClient {
    store: Arc<dyn ListStore>,
    keys: KeyNamer,
}

impl QueueClient {
    pub fn new(store: Arc<dyn ListStore>, keys: KeyNamer) -> Self {
        Self { store, keys }
    }

    /// Serialize `{class, args}` and push it to the tail of `queue`
    pub async fn enqueue(&self, queue: &str, class: &str, args: Vec<Value>) -> Result<()> {
        let record = JobRecord::new(class, args);
        self.push(queue, &record).await
    }

    pub async fn push(&self, queue: &str, record: &JobRecord) -> Result<()> {
        let key = self.keys.queue(queue);
        let len = self.store.push_tail(&key, record.encode()?).await?;
        debug!(queue, class = %record.class, len, "Job enqueued");
        Ok(())
    }

    /// Number of records waiting on `queue`
    pub async fn pending(&self, queue: &str) -> Result<usize> {
        Ok(self.store.len(&self.keys.queue(queue)).await?)
    }
}
