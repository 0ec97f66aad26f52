use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::backtrace::Backtrace;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Error raised by a handler
///
/// `kind` is recorded as the failure's exception class; a backtrace is
/// captured where the error is constructed.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct JobError {
    kind: String,
    message: String,
    trace: String,
}

impl JobError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            trace: Backtrace::force_capture().to_string(),
        }
    }

    /// Wrap any error, using its type name as the kind
    pub fn from_error<E: std::error::Error>(err: E) -> Self {
        Self::new(short_type_name::<E>(), err.to_string())
    }

    /// Build from a caught panic payload
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "handler panicked".to_string()
        };
        Self::new("panic", message)
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn backtrace(&self) -> &str {
        &self.trace
    }
}

/// Last path segment of a type name, without generic parameters
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Executable registered for a job name
///
/// Handlers receive the record's arguments positionally and report failure
/// through [`JobError`]. A panic inside `perform` is caught by the dispatcher
/// and recorded as a failure.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Job name used when registering without an explicit one
    fn name(&self) -> &str {
        short_type_name::<Self>()
    }

    async fn perform(&self, args: Vec<Value>) -> Result<(), JobError>;
}

/// Handler backed by an async closure
pub struct FnHandler<F> {
    name: String,
    func: F,
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn perform(&self, args: Vec<Value>) -> Result<(), JobError> {
        (self.func)(args).await
    }
}

/// Wrap an async closure as a named handler
pub fn handler_fn<F, Fut>(name: impl Into<String>, func: F) -> Arc<dyn JobHandler>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), JobError>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        func,
    })
}
