use crate::humanize::HumanDuration;
use crate::keys::DEFAULT_NAMESPACE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    /// Job name -> handler wiring for `dispatchbox work`
    #[serde(default)]
    pub handlers: BTreeMap<String, HandlerConfig>,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
    /// Prefix for every key written to the store
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            namespace: default_namespace(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("data/store")
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

/// Poll loop configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerSettings {
    #[serde(default = "default_interval")]
    pub interval: HumanDuration,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

fn default_interval() -> HumanDuration {
    HumanDuration::from_secs(5)
}

/// Handler wiring: which built-in handler serves a job name on a queue
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HandlerConfig {
    /// Built-in handler kind (`echo`, `sleep`, `fail`)
    pub handler: String,
    #[serde(default = "default_queue")]
    pub queue: String,
}

fn default_queue() -> String {
    "default".to_string()
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_log_filter() -> String {
    "info".to_string()
}
