//! Sequential refresh across all configured retailers.
//!
//! Retailers are fetched one at a time in table order with a pause between
//! them. Each retailer's records are validated, then the merged set is
//! deduplicated on name and suburb. One retailer failing never stops the run.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tradeprice_core::{Provenance, RetailerConfig, RetailersFile, StoreLocation};

use crate::error::ScraperError;
use crate::fetcher::{FetchOutcome, StoreFetcher};
use crate::validate::{validate_stores, ValidationSummary};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetailerError {
    pub retailer: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// One retailer's validated records.
#[derive(Debug, Clone)]
pub struct RetailerResult {
    pub retailer: String,
    pub stores: Vec<StoreLocation>,
    pub provenance: Provenance,
    pub validation: ValidationSummary,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AggregateResult {
    pub stores: Vec<StoreLocation>,
    pub total: usize,
    pub successful_retailers: Vec<String>,
    pub errors: Vec<RetailerError>,
    pub duration_ms: u64,
    pub provenance: BTreeMap<String, Provenance>,
}

/// Drop records whose [`StoreLocation::dedup_key`] was already seen.
#[must_use]
pub fn dedup_stores(stores: Vec<StoreLocation>) -> Vec<StoreLocation> {
    let mut seen = HashSet::new();
    stores
        .into_iter()
        .filter(|s| seen.insert(s.dedup_key()))
        .collect()
}

/// Pause after visiting `retailer`: its own rate limit, floored at
/// `min_delay`. A zero floor disables pausing.
pub(crate) fn retailer_pause(min_delay: Duration, retailer: &RetailerConfig) -> Duration {
    if min_delay.is_zero() {
        return Duration::ZERO;
    }
    min_delay.max(Duration::from_millis(retailer.rate_limit_ms))
}

pub struct Orchestrator {
    retailers: Arc<RetailersFile>,
    fetcher: StoreFetcher,
    min_delay: Duration,
}

impl Orchestrator {
    /// `min_delay` is the floor for the pause between retailers; each
    /// retailer's own `rate_limit_ms` applies when it is longer.
    #[must_use]
    pub fn new(retailers: Arc<RetailersFile>, fetcher: StoreFetcher, min_delay: Duration) -> Self {
        Self {
            retailers,
            fetcher,
            min_delay,
        }
    }

    /// Tests and one-shot tools run without pauses.
    #[must_use]
    pub fn without_delay(retailers: Arc<RetailersFile>, fetcher: StoreFetcher) -> Self {
        Self {
            retailers,
            fetcher,
            min_delay: Duration::ZERO,
        }
    }

    fn delay_after(&self, retailer: &RetailerConfig) -> Duration {
        retailer_pause(self.min_delay, retailer)
    }

    /// Fetch and validate one retailer.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownRetailer`] if `retailer_id` is not in
    /// the retailer table.
    pub async fn refresh_one(&self, retailer_id: &str) -> Result<RetailerResult, ScraperError> {
        let retailer = self
            .retailers
            .get(retailer_id)
            .ok_or_else(|| ScraperError::UnknownRetailer(retailer_id.to_string()))?;
        Ok(self.refresh_retailer(retailer).await)
    }

    async fn refresh_retailer(&self, retailer: &RetailerConfig) -> RetailerResult {
        let FetchOutcome {
            stores,
            provenance,
            fallback_reason,
            ..
        } = self.fetcher.fetch(retailer).await;
        let (stores, validation) = validate_stores(&retailer.id, stores);
        RetailerResult {
            retailer: retailer.id.clone(),
            stores,
            provenance,
            validation,
            fallback_reason: fallback_reason.map(|r| r.to_string()),
        }
    }

    /// Refresh every retailer in table order and merge the results.
    pub async fn refresh_all(&self) -> AggregateResult {
        let started = Instant::now();
        let mut merged = Vec::new();
        let mut successful_retailers = Vec::new();
        let mut errors = Vec::new();
        let mut provenance = BTreeMap::new();

        let count = self.retailers.retailers.len();
        for (i, retailer) in self.retailers.retailers.iter().enumerate() {
            let result = self.refresh_retailer(retailer).await;
            provenance.insert(result.retailer.clone(), result.provenance);

            if result.stores.is_empty() {
                let message = result
                    .fallback_reason
                    .unwrap_or_else(|| "no valid stores".to_string());
                tracing::warn!(retailer = %retailer.id, %message, "retailer produced no stores");
                errors.push(RetailerError {
                    retailer: retailer.id.clone(),
                    message,
                    timestamp: Utc::now(),
                });
            } else {
                successful_retailers.push(retailer.id.clone());
                merged.extend(result.stores);
            }

            if i + 1 < count {
                let delay = self.delay_after(retailer);
                if !delay.is_zero() {
                    tracing::debug!(retailer = %retailer.id, ?delay, "pausing before next retailer");
                    tokio::time::sleep(delay).await;
                }
            }
        }

        let stores = dedup_stores(merged);
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            total = stores.len(),
            successful = successful_retailers.len(),
            failed = errors.len(),
            duration_ms,
            "store refresh complete"
        );
        AggregateResult {
            total: stores.len(),
            stores,
            successful_retailers,
            errors,
            duration_ms,
            provenance,
        }
    }
}
