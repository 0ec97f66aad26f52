use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::{ListStore, Result, StoreError};

const LIST_KEY_TERMINATOR: u8 = 0x00;

/// FjallStore keeps lists and counters in an embedded Fjall keyspace
///
/// Architecture:
/// - `lists` partition: `{list key}\0{seq: u64 BE}` -> value (UTF-8)
/// - `counters` partition: `{counter key}` -> i64 (big-endian)
///
/// A prefix scan over `{list key}\0` yields elements in push order, so the
/// head is the first entry and the tail the last. Push, pop and increment
/// are read-modify-write sequences and run under `write_lock`, which makes
/// pop atomic for every worker sharing this handle.
///
/// Sequence numbers within a list are contiguous (push takes tail + 1, pop
/// only removes the head), so a list's length is `tail - head + 1`.
#[derive(Clone)]
pub struct FjallStore {
    keyspace: Keyspace,
    lists: PartitionHandle,
    counters: PartitionHandle,
    write_lock: Arc<Mutex<()>>,
}

impl FjallStore {
    /// Open or create a FjallStore at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening FjallStore at: {}", path.display());

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let keyspace = Config::new(path).open()?;
        let lists = keyspace.open_partition("lists", PartitionCreateOptions::default())?;
        let counters = keyspace.open_partition("counters", PartitionCreateOptions::default())?;

        info!("FjallStore opened successfully");
        Ok(Self {
            keyspace,
            lists,
            counters,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// Flush all writes to disk
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_lock.lock().map_err(|_| StoreError::Poisoned)
    }

    fn decode_value(key: &str, bytes: &[u8]) -> Result<String> {
        String::from_utf8(bytes.to_vec()).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    fn decode_counter(key: &str, bytes: &[u8]) -> Result<i64> {
        let raw: [u8; 8] = bytes.try_into().map_err(|_| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("expected 8 bytes, found {}", bytes.len()),
        })?;
        Ok(i64::from_be_bytes(raw))
    }

    fn read_counter(&self, key: &str) -> Result<i64> {
        match self.counters.get(key)? {
            Some(bytes) => Self::decode_counter(key, &bytes),
            None => Ok(0),
        }
    }

    fn element_seq(key: &str, element: &[u8]) -> Result<u64> {
        decode_element_seq(element).ok_or_else(|| StoreError::Corrupt {
            key: key.to_string(),
            reason: "malformed list element key".to_string(),
        })
    }

    /// Head and tail sequence numbers, `None` for an empty list
    fn list_bounds(&self, key: &str) -> Result<Option<(u64, u64)>> {
        let prefix = encode_list_prefix(key);

        let head = match self.lists.prefix(&prefix).next() {
            Some(item) => {
                let (element, _) = item?;
                Self::element_seq(key, &element)?
            }
            None => return Ok(None),
        };
        let tail = match self.lists.prefix(&prefix).next_back() {
            Some(item) => {
                let (element, _) = item?;
                Self::element_seq(key, &element)?
            }
            None => head,
        };

        Ok(Some((head, tail)))
    }
}

fn bounds_len(bounds: Option<(u64, u64)>) -> usize {
    bounds.map_or(0, |(head, tail)| (tail - head + 1) as usize)
}

/// Encode a list prefix for range scans: {key}\0
fn encode_list_prefix(key: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(key.len() + 1);
    prefix.extend_from_slice(key.as_bytes());
    prefix.push(LIST_KEY_TERMINATOR);
    prefix
}

/// Encode a list element key: {key}\0{seq:BE}
fn encode_element_key(key: &str, seq: u64) -> Vec<u8> {
    let mut element = encode_list_prefix(key);
    element.extend_from_slice(&seq.to_be_bytes());
    element
}

/// Decode the sequence number from a list element key
fn decode_element_seq(element: &[u8]) -> Option<u64> {
    let start = element.len().checked_sub(8)?;
    let raw: [u8; 8] = element[start..].try_into().ok()?;
    Some(u64::from_be_bytes(raw))
}

#[async_trait]
impl ListStore for FjallStore {
    async fn push_tail(&self, key: &str, value: String) -> Result<usize> {
        let _guard = self.lock()?;

        let (head, next_seq) = match self.list_bounds(key)? {
            Some((head, tail)) => (head, tail + 1),
            None => (0, 0),
        };

        self.lists.insert(encode_element_key(key, next_seq), value.as_bytes())?;
        debug!(key, seq = next_seq, "Pushed list element");

        Ok(bounds_len(Some((head, next_seq))))
    }

    async fn pop_head(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock()?;

        let head = match self.lists.prefix(encode_list_prefix(key)).next() {
            Some(item) => item?,
            None => return Ok(None),
        };

        let (element, value) = head;
        self.lists.remove(element)?;
        debug!(key, "Popped list element");

        Self::decode_value(key, &value).map(Some)
    }

    async fn increment(&self, key: &str) -> Result<i64> {
        let _guard = self.lock()?;
        let next = self.read_counter(key)? + 1;
        self.counters.insert(key, next.to_be_bytes())?;
        Ok(next)
    }

    async fn counter(&self, key: &str) -> Result<i64> {
        self.read_counter(key)
    }

    async fn len(&self, key: &str) -> Result<usize> {
        let _guard = self.lock()?;
        Ok(bounds_len(self.list_bounds(key)?))
    }

    async fn range(&self, key: &str, start: usize, limit: usize) -> Result<Vec<String>> {
        let mut values = Vec::new();
        for item in self.lists.prefix(encode_list_prefix(key)).skip(start).take(limit) {
            let (_, value) = item?;
            values.push(Self::decode_value(key, &value)?);
        }
        Ok(values)
    }
}
