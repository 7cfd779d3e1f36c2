//! In-memory TTL cache shared by the store and price services.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Source of "now" for expiry checks. Tests drive a [`ManualClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    expires_at: DateTime<Utc>,
    written_at: DateTime<Utc>,
}

/// Snapshot of cache occupancy and lookup effectiveness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    /// Hits divided by lookups since creation; 0 before the first lookup.
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct Inner<T> {
    entries: HashMap<String, CacheEntry<T>>,
    hits: u64,
    misses: u64,
}

/// Keyed cache whose entries expire a fixed TTL after they were written.
///
/// An entry is a miss from the instant `now >= expires_at`. Expired entries
/// stay resident until [`TtlCache::sweep_expired`] runs.
pub struct TtlCache<T> {
    inner: Mutex<Inner<T>>,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached value for `key` if present and unexpired.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let value = inner
            .entries
            .get(key)
            .filter(|e| now < e.expires_at)
            .map(|e| e.value.clone());
        if value.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        value
    }

    /// Store `value` under `key`, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let now = self.clock.now();
        self.lock().entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: now + ttl,
                written_at: now,
            },
        );
    }

    /// When `key` was last written, whether or not it has expired.
    pub fn written_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.lock().entries.get(key).map(|e| e.written_at)
    }

    pub fn remove(&self, key: &str) -> Option<T> {
        self.lock().entries.remove(key).map(|e| e.value)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| now < e.expires_at);
        before - inner.entries.len()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn stats(&self) -> CacheStats {
        let now = self.clock.now();
        let inner = self.lock();
        let total = inner.entries.len();
        let valid = inner
            .entries
            .values()
            .filter(|e| now < e.expires_at)
            .count();
        let lookups = inner.hits + inner.misses;
        let hit_rate = if lookups == 0 {
            0.0
        } else {
            inner.hits as f64 / lookups as f64
        };
        CacheStats {
            total,
            valid,
            expired: total - valid,
            hit_rate,
        }
    }
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
