//! Per-retailer store fetcher.
//!
//! Every retailer runs the same sequence: check that page automation is
//! available, ping the official site, then try extraction strategies in
//! priority order (embedded JSON, network JSON, visible elements,
//! interactive filters, region search). The first strategy with at least one
//! record that survives normalization and carries every required field wins.
//! When none does, the retailer's fallback list is returned instead. Fetching
//! never fails outward.

mod formats;

pub(crate) use formats::{element_text, extract_balanced, parse_selector};

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tradeprice_core::{Provenance, RetailerConfig, StoreLocation};

use crate::error::ScraperError;
use crate::fallback::FallbackProvider;
use crate::normalize::{dedup_raw, normalize_all};
use crate::page::PageSource;
use crate::validate::missing_fields;
use formats::{
    extract_embedded_stores, extract_visible_stores, fetch_filtered_stores, fetch_network_stores,
    fetch_region_stores,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    EmbeddedJson,
    NetworkJson,
    VisibleElements,
    InteractiveFilters,
    RegionSearch,
}

impl Strategy {
    /// Priority order.
    pub const ALL: [Strategy; 5] = [
        Strategy::EmbeddedJson,
        Strategy::NetworkJson,
        Strategy::VisibleElements,
        Strategy::InteractiveFilters,
        Strategy::RegionSearch,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Strategy::EmbeddedJson => "embedded_json",
            Strategy::NetworkJson => "network_json",
            Strategy::VisibleElements => "visible_elements",
            Strategy::InteractiveFilters => "interactive_filters",
            Strategy::RegionSearch => "region_search",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one extraction strategy. Failures are values, not errors.
#[derive(Debug)]
pub enum StrategyOutcome {
    Records(Vec<Value>),
    Empty,
    Failed(String),
}

impl From<Result<Vec<Value>, ScraperError>> for StrategyOutcome {
    fn from(result: Result<Vec<Value>, ScraperError>) -> Self {
        match result {
            Ok(records) if records.is_empty() => StrategyOutcome::Empty,
            Ok(records) => StrategyOutcome::Records(records),
            Err(e) => StrategyOutcome::Failed(e.to_string()),
        }
    }
}

/// Why a fetch ended on fallback data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    AutomationUnavailable,
    RetailerUnreachable(String),
    StrategiesExhausted,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::AutomationUnavailable => f.write_str("page automation unavailable"),
            FallbackReason::RetailerUnreachable(reason) => f.write_str(reason),
            FallbackReason::StrategiesExhausted => f.write_str("no strategy produced stores"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub stores: Vec<StoreLocation>,
    pub provenance: Provenance,
    /// The winning strategy, when live data was used.
    pub strategy: Option<Strategy>,
    pub fallback_reason: Option<FallbackReason>,
}

pub struct StoreFetcher {
    source: Arc<dyn PageSource>,
    fallback: Arc<FallbackProvider>,
}

impl StoreFetcher {
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>, fallback: Arc<FallbackProvider>) -> Self {
        Self { source, fallback }
    }

    /// Fetch `retailer`'s stores, live if possible and from the fallback list
    /// otherwise.
    pub async fn fetch(&self, retailer: &RetailerConfig) -> FetchOutcome {
        if !self.source.automation_enabled() {
            return self.fall_back(retailer, FallbackReason::AutomationUnavailable);
        }
        if let Err(e) = self.check_reachable(retailer).await {
            return self.fall_back(retailer, FallbackReason::RetailerUnreachable(e.to_string()));
        }

        let html = match self.source.fetch_html(&retailer.store_locator_url).await {
            Ok(html) => Some(html),
            Err(e) => {
                tracing::debug!(retailer = %retailer.id, error = %e, "locator page failed to load");
                None
            }
        };

        for strategy in Strategy::ALL {
            match self.run(strategy, retailer, html.as_deref()).await {
                StrategyOutcome::Records(raw) => {
                    let raw_count = raw.len();
                    let stores: Vec<StoreLocation> =
                        normalize_all(retailer, &dedup_raw(raw), Provenance::LiveFetch)
                            .into_iter()
                            .filter(|s| missing_fields(s).is_empty())
                            .collect();
                    if !stores.is_empty() {
                        tracing::info!(
                            retailer = %retailer.id,
                            %strategy,
                            count = stores.len(),
                            "fetched live stores"
                        );
                        return FetchOutcome {
                            stores,
                            provenance: Provenance::LiveFetch,
                            strategy: Some(strategy),
                            fallback_reason: None,
                        };
                    }
                    tracing::debug!(
                        retailer = %retailer.id,
                        %strategy,
                        raw_count,
                        "no complete records after normalization"
                    );
                }
                StrategyOutcome::Empty => {
                    tracing::debug!(retailer = %retailer.id, %strategy, "strategy found nothing");
                }
                StrategyOutcome::Failed(reason) => {
                    tracing::debug!(retailer = %retailer.id, %strategy, %reason, "strategy failed");
                }
            }
        }

        self.fall_back(retailer, FallbackReason::StrategiesExhausted)
    }

    async fn check_reachable(&self, retailer: &RetailerConfig) -> Result<(), ScraperError> {
        match self.source.ping(&retailer.official_site).await {
            Ok(status) if status >= 400 => Err(ScraperError::RetailerUnreachable {
                retailer: retailer.id.clone(),
                reason: format!("HTTP {status}"),
            }),
            Ok(_) => Ok(()),
            Err(e) => Err(ScraperError::RetailerUnreachable {
                retailer: retailer.id.clone(),
                reason: e.to_string(),
            }),
        }
    }

    async fn run(
        &self,
        strategy: Strategy,
        retailer: &RetailerConfig,
        html: Option<&str>,
    ) -> StrategyOutcome {
        let source = self.source.as_ref();
        match (strategy, html) {
            (Strategy::RegionSearch, _) => fetch_region_stores(source, retailer).await.into(),
            (_, None) => StrategyOutcome::Failed("locator page unavailable".to_string()),
            (Strategy::EmbeddedJson, Some(html)) => {
                Ok::<_, ScraperError>(extract_embedded_stores(html)).into()
            }
            (Strategy::NetworkJson, Some(html)) => {
                fetch_network_stores(source, retailer, html).await.into()
            }
            (Strategy::VisibleElements, Some(html)) => {
                extract_visible_stores(html, &retailer.store_selectors).into()
            }
            (Strategy::InteractiveFilters, Some(html)) => {
                fetch_filtered_stores(source, retailer, html).await.into()
            }
        }
    }

    fn fall_back(&self, retailer: &RetailerConfig, reason: FallbackReason) -> FetchOutcome {
        let stores = self.fallback.stores(&retailer.id);
        tracing::info!(
            retailer = %retailer.id,
            %reason,
            count = stores.len(),
            "using fallback store list"
        );
        FetchOutcome {
            stores,
            provenance: Provenance::FallbackLiteral,
            strategy: None,
            fallback_reason: Some(reason),
        }
    }
}

#[cfg(test)]
mod tests;
