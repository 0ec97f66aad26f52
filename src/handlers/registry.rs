use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use super::traits::JobHandler;

/// Exception name recorded for jobs with no registered handler
pub const MISSING_JOB_EXCEPTION: &str = "MissingJobError";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("No job named \"{class}\"")]
    MissingJob { queue: String, class: String },
}

impl RegistryError {
    pub fn exception(&self) -> &'static str {
        match self {
            RegistryError::MissingJob { .. } => MISSING_JOB_EXCEPTION,
        }
    }
}

/// Registry mapping queue name -> job name -> handler
///
/// Built once during worker setup and shared read-only with the dispatcher
/// and the poll loop. Queues polled are exactly the queues with at least one
/// registration.
#[derive(Clone, Default)]
pub struct JobRegistry {
    queues: BTreeMap<String, BTreeMap<String, Arc<dyn JobHandler>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `job_name` on `queue`
    ///
    /// Without an explicit job name the handler's own name is used. A later
    /// registration for the same (queue, job name) replaces the earlier one.
    pub fn register(
        &mut self,
        queue: impl Into<String>,
        job_name: Option<&str>,
        handler: Arc<dyn JobHandler>,
    ) -> &mut Self {
        let queue = queue.into();
        let job_name = job_name.unwrap_or_else(|| handler.name()).to_string();

        let replaced = self
            .queues
            .entry(queue.clone())
            .or_default()
            .insert(job_name.clone(), handler)
            .is_some();

        debug!(queue = %queue, job = %job_name, replaced, "Registered job handler");
        self
    }

    pub fn resolve(&self, queue: &str, class: &str) -> Result<Arc<dyn JobHandler>, RegistryError> {
        self.queues
            .get(queue)
            .and_then(|jobs| jobs.get(class))
            .cloned()
            .ok_or_else(|| RegistryError::MissingJob {
                queue: queue.to_string(),
                class: class.to_string(),
            })
    }

    pub fn has_job(&self, queue: &str, class: &str) -> bool {
        self.queues
            .get(queue)
            .is_some_and(|jobs| jobs.contains_key(class))
    }

    /// Queues with at least one registered job
    pub fn queues(&self) -> impl Iterator<Item = &str> {
        self.queues.keys().map(String::as_str)
    }

    /// Job names registered on a queue
    pub fn jobs(&self, queue: &str) -> Vec<&str> {
        self.queues
            .get(queue)
            .map(|jobs| jobs.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }
}
