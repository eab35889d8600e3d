use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum StoreError {
    /// A single entry larger than the whole budget can never be stored.
    #[error("entry of {size} chars exceeds the cache budget of {max_size}")]
    TooBig { size: usize, max_size: usize },
}

/// A stored value and the time the originating API node stamped the write.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub value: String,
    pub timestamp: DateTime<Utc>,
}

struct Inner {
    entries: HashMap<String, Entry>,
    /// Install order, oldest at the front. Rewrites re-install at the back.
    order: VecDeque<String>,
    /// Character count over all keys and values.
    used: usize,
}

/// Character-budgeted key/value store with install-order eviction.
///
/// Writes converge via last-writer-wins on the carried timestamp; an equal
/// timestamp keeps the entry already present.
pub struct CacheStore {
    max_size: usize,
    inner: Mutex<Inner>,
}

impl CacheStore {
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                used: 0,
            }),
        }
    }

    /// Stores `value` under `key`.
    ///
    /// An empty value deletes the key (also fine if it was absent). An entry
    /// bigger than the whole budget is rejected. Otherwise the oldest
    /// entries are evicted until the new one fits; a write older than (or as
    /// old as) the present entry reports success without replacing it.
    pub fn put(
        &self,
        key: &str,
        value: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().expect("cache lock poisoned");

        if value.is_empty() {
            Self::remove(&mut inner, key);
            return Ok(());
        }

        let size = char_count(key) + char_count(value);
        if size > self.max_size {
            return Err(StoreError::TooBig {
                size,
                max_size: self.max_size,
            });
        }

        if let Some(existing) = inner.entries.get(key)
            && existing.timestamp >= timestamp
        {
            return Ok(());
        }

        Self::remove(&mut inner, key);
        while inner.used + size > self.max_size {
            if let Some(oldest) = inner.order.front().cloned() {
                Self::remove(&mut inner, &oldest);
            } else {
                break;
            }
        }

        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                timestamp,
            },
        );
        inner.order.push_back(key.to_string());
        inner.used += size;
        tracing::debug!(
            "stored {} ({} of {} chars used)",
            key,
            inner.used,
            self.max_size
        );
        Ok(())
    }

    /// Looks up a key. Reads do not affect the eviction order.
    pub fn get(&self, key: &str) -> Option<Entry> {
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.get(key).cloned()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Characters currently used by keys and values together.
    pub fn used(&self) -> usize {
        let inner = self.inner.lock().expect("cache lock poisoned");
        inner.used
    }

    fn remove(inner: &mut Inner, key: &str) {
        if let Some(entry) = inner.entries.remove(key) {
            inner.used -= char_count(key) + char_count(&entry.value);
            inner.order.retain(|k| k != key);
        }
    }
}

fn char_count(s: &str) -> usize {
    s.chars().count()
}
