use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::traits::{JobError, JobHandler};

/// Handler kinds the binary can wire up from configuration
pub const BUILTIN_HANDLERS: &[&str] = &["echo", "sleep", "fail"];

/// Look up a built-in handler by kind
pub fn builtin(kind: &str) -> Option<Arc<dyn JobHandler>> {
    match kind {
        "echo" => Some(Arc::new(EchoHandler)),
        "sleep" => Some(Arc::new(SleepHandler)),
        "fail" => Some(Arc::new(FailHandler)),
        _ => None,
    }
}

/// Logs its arguments and succeeds
#[derive(Debug, Clone, Copy)]
pub struct EchoHandler;

#[async_trait]
impl JobHandler for EchoHandler {
    fn name(&self) -> &str {
        "echo"
    }

    async fn perform(&self, args: Vec<Value>) -> Result<(), JobError> {
        info!(args = %serde_json::Value::Array(args), "echo");
        Ok(())
    }
}

/// Sleeps for `args[0]` milliseconds
#[derive(Debug, Clone, Copy)]
pub struct SleepHandler;

#[async_trait]
impl JobHandler for SleepHandler {
    fn name(&self) -> &str {
        "sleep"
    }

    async fn perform(&self, args: Vec<Value>) -> Result<(), JobError> {
        let millis = args.first().and_then(Value::as_u64).ok_or_else(|| {
            JobError::new(
                "ArgumentError",
                "sleep expects a non-negative millisecond count as its first argument",
            )
        })?;
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(())
    }
}

/// Always fails, with `args[0]` as the message when it is a string
#[derive(Debug, Clone, Copy)]
pub struct FailHandler;

#[async_trait]
impl JobHandler for FailHandler {
    fn name(&self) -> &str {
        "fail"
    }

    async fn perform(&self, args: Vec<Value>) -> Result<(), JobError> {
        let message = args
            .first()
            .and_then(Value::as_str)
            .unwrap_or("job failed")
            .to_string();
        Err(JobError::new("RuntimeError", message))
    }
}
