use super::models::Config;
use crate::handlers::BUILTIN_HANDLERS;
use crate::keys::SEPARATOR;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Store namespace must not be empty")]
    EmptyNamespace,

    #[error("Store namespace '{namespace}' must not contain ':'")]
    InvalidNamespace { namespace: String },

    #[error("Worker interval must be positive")]
    ZeroInterval,

    #[error("Job '{job}' uses unknown handler '{handler}' (expected one of: {known})")]
    UnknownHandler {
        job: String,
        handler: String,
        known: String,
    },

    #[error("Job '{job}' has an empty queue name")]
    EmptyQueue { job: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_store(config)?;
    validate_worker(config)?;
    validate_handlers(config)?;
    Ok(())
}

fn validate_store(config: &Config) -> Result<(), ValidationError> {
    let namespace = &config.store.namespace;

    if namespace.is_empty() {
        return Err(ValidationError::EmptyNamespace);
    }

    if namespace.contains(SEPARATOR) {
        return Err(ValidationError::InvalidNamespace {
            namespace: namespace.clone(),
        });
    }

    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.interval.is_zero() {
        return Err(ValidationError::ZeroInterval);
    }

    Ok(())
}

/// Every configured job must name a built-in handler and a queue
fn validate_handlers(config: &Config) -> Result<(), ValidationError> {
    for (job, handler_config) in &config.handlers {
        if !BUILTIN_HANDLERS.contains(&handler_config.handler.as_str()) {
            return Err(ValidationError::UnknownHandler {
                job: job.clone(),
                handler: handler_config.handler.clone(),
                known: BUILTIN_HANDLERS.join(", "),
            });
        }

        if handler_config.queue.trim().is_empty() {
            return Err(ValidationError::EmptyQueue { job: job.clone() });
        }
    }

    Ok(())
}
