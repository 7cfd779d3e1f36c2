//! Per-key in-progress markers for refresh work.
//!
//! Every cache miss and every forced refresh holds the key for its data set
//! while it fetches. A forced request that finds the key held fails with
//! [`ScraperError::RefreshInProgress`](crate::ScraperError::RefreshInProgress);
//! a plain read serves cached or fallback data instead.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tradeprice_core::MatchQuery;

pub const STORES_KEY: &str = "stores";
pub const PRODUCTS_KEY: &str = "products";

#[must_use]
pub fn price_guard_key(query: &MatchQuery) -> String {
    format!("prices:{}", query.cache_key())
}

#[derive(Debug, Default)]
pub struct RefreshGuards {
    running: Mutex<BTreeSet<String>>,
}

impl RefreshGuards {
    fn lock(&self) -> MutexGuard<'_, BTreeSet<String>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `key` as running. `None` if it already is. The mark is cleared
    /// when the returned permit drops.
    pub fn try_acquire(self: &Arc<Self>, key: impl Into<String>) -> Option<RefreshPermit> {
        let key = key.into();
        if !self.lock().insert(key.clone()) {
            return None;
        }
        Some(RefreshPermit {
            guards: Arc::clone(self),
            key,
        })
    }

    #[must_use]
    pub fn is_running(&self, key: &str) -> bool {
        self.lock().contains(key)
    }

    /// Keys currently held, sorted.
    #[must_use]
    pub fn running(&self) -> Vec<String> {
        self.lock().iter().cloned().collect()
    }
}

#[derive(Debug)]
pub struct RefreshPermit {
    guards: Arc<RefreshGuards>,
    key: String,
}

impl RefreshPermit {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RefreshPermit {
    fn drop(&mut self) {
        self.guards.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let guards = Arc::new(RefreshGuards::default());
        let permit = guards.try_acquire(STORES_KEY).expect("first acquire");
        assert!(guards.try_acquire(STORES_KEY).is_none());
        assert!(guards.is_running(STORES_KEY));
        assert_eq!(guards.running(), vec!["stores".to_string()]);

        drop(permit);
        assert!(guards.running().is_empty());
        assert!(guards.try_acquire(STORES_KEY).is_some());
    }

    #[test]
    fn keys_are_independent() {
        let guards = Arc::new(RefreshGuards::default());
        let query = MatchQuery::new("Makita DHP484Z", Some("Makita"));
        let _stores = guards.try_acquire(STORES_KEY).expect("stores");
        let _products = guards.try_acquire(PRODUCTS_KEY).expect("products");
        let prices = guards
            .try_acquire(price_guard_key(&query))
            .expect("prices");
        assert_eq!(guards.running().len(), 3);
        assert_eq!(prices.key(), "prices:makita dhp484z");
    }
}
