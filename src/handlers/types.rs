use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Format of `failed_at`: UTC, microsecond precision
pub const FAILED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Unit of work as it sits on a queue
///
/// `class` names the handler; `args` are passed to it positionally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub class: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl JobRecord {
    pub fn new(class: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            class: class.into(),
            args,
        }
    }

    /// Decode a raw queue entry. A missing `class` is an error.
    pub fn decode(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Read the record out of an already parsed queue entry
    pub fn from_body(body: &Value) -> serde_json::Result<Self> {
        Self::deserialize(body)
    }

    pub fn encode(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Entry appended to the failure log for every failed dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailurePayload {
    /// Job name the record asked for
    pub worker: String,
    pub queue: String,
    /// The queue entry exactly as it was dequeued, unknown fields included
    pub payload: Value,
    /// Error class name
    pub exception: String,
    /// Error message
    pub error: String,
    pub backtrace: String,
    pub failed_at: String,
}

impl FailurePayload {
    pub fn new(
        queue: &str,
        record: &JobRecord,
        body: &Value,
        exception: impl Into<String>,
        error: impl Into<String>,
        backtrace: impl Into<String>,
    ) -> Self {
        Self {
            worker: record.class.clone(),
            queue: queue.to_string(),
            payload: body.clone(),
            exception: exception.into(),
            error: error.into(),
            backtrace: backtrace.into(),
            failed_at: chrono::Utc::now().format(FAILED_AT_FORMAT).to_string(),
        }
    }
}
