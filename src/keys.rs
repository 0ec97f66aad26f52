/// Key layout for everything dispatchbox stores
///
/// All keys live under a single namespace and are joined with `:`:
/// - `{ns}:queue:{name}` -> list of serialized job records
/// - `{ns}:stat:processed` / `{ns}:stat:failed` -> global counters
/// - `{ns}:stat:processed:{job}` / `{ns}:stat:failed:{job}` -> per-job counters
/// - `{ns}:failed` -> list of serialized failure payloads

pub const DEFAULT_NAMESPACE: &str = "resque";
pub const SEPARATOR: &str = ":";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyNamer {
    namespace: String,
}

impl KeyNamer {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Join the namespace with the given parts
    pub fn key(&self, parts: &[&str]) -> String {
        let mut key = self.namespace.clone();
        for part in parts {
            key.push_str(SEPARATOR);
            key.push_str(part);
        }
        key
    }

    pub fn queue(&self, name: &str) -> String {
        self.key(&["queue", name])
    }

    pub fn processed(&self) -> String {
        self.key(&["stat", "processed"])
    }

    pub fn processed_for(&self, job: &str) -> String {
        self.key(&["stat", "processed", job])
    }

    pub fn failed(&self) -> String {
        self.key(&["stat", "failed"])
    }

    pub fn failed_for(&self, job: &str) -> String {
        self.key(&["stat", "failed", job])
    }

    /// The append-only failure log
    pub fn failure_log(&self) -> String {
        self.key(&["failed"])
    }
}

impl Default for KeyNamer {
    fn default() -> Self {
        Self::new(DEFAULT_NAMESPACE)
    }
}
