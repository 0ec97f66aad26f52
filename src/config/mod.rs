//! Configuration management for dispatchbox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use dispatchbox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Store path: {}", config.store.path.display());
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `DISPATCHBOX__<section>__<key>`
//!
//! Examples:
//! - `DISPATCHBOX__STORE__PATH=/var/lib/dispatchbox`
//! - `DISPATCHBOX__WORKER__INTERVAL=500ms`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/dispatchbox.toml`.
//! This can be overridden using the `DISPATCHBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::HumanDuration;
pub use models::{Config, HandlerConfig, LogFormat, StoreConfig, TelemetryConfig, WorkerSettings};
pub use validation::ValidationError;

use crate::handlers::{builtin, JobRegistry};
use crate::keys::KeyNamer;
use crate::worker::WorkerConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file is malformed or validation fails.
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    pub fn key_namer(&self) -> KeyNamer {
        KeyNamer::new(self.store.namespace.clone())
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            interval: self.worker.interval.as_duration(),
        }
    }

    /// Registry wired from the `[handlers.*]` tables
    ///
    /// Entries naming an unknown handler are skipped; `load` rejects them.
    pub fn registry(&self) -> JobRegistry {
        let mut registry = JobRegistry::new();
        for (job, handler_config) in &self.handlers {
            match builtin(&handler_config.handler) {
                Some(handler) => {
                    registry.register(handler_config.queue.clone(), Some(job.as_str()), handler);
                }
                None => tracing::warn!(
                    job = %job,
                    handler = %handler_config.handler,
                    "Skipping unknown handler"
                ),
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_load_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[store]
path = "data/test"
namespace = "app"

[worker]
interval = "100ms"

[telemetry]
log_filter = "dispatchbox=debug"
log_format = "json"

[handlers.send_email]
handler = "echo"
queue = "mail"

[handlers.nap]
handler = "sleep"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.key_namer().queue("mail"), "app:queue:mail");
        assert_eq!(config.worker_config().interval, Duration::from_millis(100));
        assert_eq!(config.telemetry.log_format, LogFormat::Json);

        let registry = config.registry();
        assert!(registry.has_job("mail", "send_email"));
        assert!(registry.has_job("default", "nap"));
        assert_eq!(registry.queues().collect::<Vec<_>>(), vec!["default", "mail"]);
    }

    #[test]
    fn test_validation_rejects_unknown_handler() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(
            &config_path,
            r#"
[handlers.send_email]
handler = "smtp"
            "#,
        )
        .unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::UnknownHandler { .. })
        ));
    }

    #[test]
    fn test_registry_skips_unknown_handler() {
        let mut config = Config::default();
        config.handlers.insert(
            "job".to_string(),
            HandlerConfig {
                handler: "smtp".to_string(),
                queue: "q".to_string(),
            },
        );

        assert!(config.registry().is_empty());
    }
}
