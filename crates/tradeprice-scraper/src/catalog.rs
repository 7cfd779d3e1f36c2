//! Product catalog built by browsing each retailer's search pages.
//!
//! A refresh searches the first terms of every category at every retailer
//! that has both a search URL and product selectors. Retailers are visited
//! one at a time with the same pause as the store refresh. When nothing
//! live comes back the recorded catalog stands in.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tradeprice_core::{
    dedup_products, CategoryTable, Product, ProductPriceQuote, Provenance, RetailerConfig,
    RetailersFile,
};

use crate::error::ScraperError;
use crate::fallback::FallbackProvider;
use crate::normalize::product_id;
use crate::orchestrator::{retailer_pause, RetailerError};
use crate::page::PageSource;
use crate::prices::{parse_product_cards, parse_state_products, RawProduct};

/// Results kept from a single search page.
pub const MAX_PRODUCTS_PER_SEARCH: usize = 15;

/// Category given to products found by a free-text search.
pub const SEARCH_RESULT_CATEGORY: &str = "search-result";

#[derive(Debug, Clone, Serialize)]
pub struct CatalogRefresh {
    pub products: Vec<Product>,
    pub total: usize,
    pub errors: Vec<RetailerError>,
    pub duration_ms: u64,
    pub provenance: Provenance,
}

pub struct ProductCatalog {
    retailers: Arc<RetailersFile>,
    categories: Arc<CategoryTable>,
    source: Arc<dyn PageSource>,
    fallback: Arc<FallbackProvider>,
    min_delay: Duration,
}

impl ProductCatalog {
    #[must_use]
    pub fn new(
        retailers: Arc<RetailersFile>,
        categories: Arc<CategoryTable>,
        source: Arc<dyn PageSource>,
        fallback: Arc<FallbackProvider>,
        min_delay: Duration,
    ) -> Self {
        Self {
            retailers,
            categories,
            source,
            fallback,
            min_delay,
        }
    }

    #[must_use]
    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    /// The recorded catalog for every retailer, in table order.
    #[must_use]
    pub fn fallback_products(&self) -> Vec<Product> {
        self.retailers
            .retailers
            .iter()
            .flat_map(|r| self.fallback.products(&r.id))
            .collect()
    }

    fn browsable(&self) -> Vec<&RetailerConfig> {
        self.retailers
            .retailers
            .iter()
            .filter(|r| r.search_url.is_some() && r.product_selectors.is_some())
            .collect()
    }

    /// Browse every category at every searchable retailer.
    pub async fn scrape_all(&self) -> CatalogRefresh {
        let started = Instant::now();
        let mut found = Vec::new();
        let mut errors = Vec::new();

        if self.source.automation_enabled() {
            let retailers = self.browsable();
            let count = retailers.len();
            for (i, retailer) in retailers.into_iter().enumerate() {
                let (products, last_error) = self.scrape_retailer(retailer).await;
                if products.is_empty() {
                    let message = last_error.unwrap_or_else(|| "no products found".to_string());
                    tracing::warn!(retailer = %retailer.id, %message, "catalog search found nothing");
                    errors.push(RetailerError {
                        retailer: retailer.id.clone(),
                        message,
                        timestamp: Utc::now(),
                    });
                } else {
                    tracing::info!(retailer = %retailer.id, count = products.len(), "catalog searched");
                    found.extend(products);
                }

                if i + 1 < count {
                    let delay = retailer_pause(self.min_delay, retailer);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        } else {
            tracing::debug!("page automation disabled, skipping live catalog");
        }

        let mut products = dedup_products(found);
        let provenance = if products.is_empty() {
            products = self.fallback_products();
            tracing::info!(count = products.len(), "using fallback catalog");
            Provenance::FallbackLiteral
        } else {
            Provenance::LiveFetch
        };
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            total = products.len(),
            failed = errors.len(),
            duration_ms,
            %provenance,
            "catalog refresh complete"
        );
        CatalogRefresh {
            total: products.len(),
            products,
            errors,
            duration_ms,
            provenance,
        }
    }

    /// Products from every category search at one retailer, plus the last
    /// search error seen. One failed search does not stop the others.
    async fn scrape_retailer(&self, retailer: &RetailerConfig) -> (Vec<Product>, Option<String>) {
        let mut products = Vec::new();
        let mut last_error = None;
        for category in self.categories.categories() {
            for term in category.search_terms() {
                match self.search_retailer(retailer, &category.id, term).await {
                    Ok(found) => products.extend(found),
                    Err(e) => {
                        tracing::debug!(retailer = %retailer.id, term, error = %e, "catalog search failed");
                        last_error = Some(e.to_string());
                    }
                }
            }
        }
        (products, last_error)
    }

    async fn search_retailer(
        &self,
        retailer: &RetailerConfig,
        category: &str,
        term: &str,
    ) -> Result<Vec<Product>, ScraperError> {
        let Some(url) = retailer.search_url_for(term) else {
            return Ok(vec![]);
        };
        let html = self.source.fetch_html(&url).await?;
        let mut raw = match &retailer.product_selectors {
            Some(selectors) => parse_product_cards(&html, selectors, &retailer.base_url)?,
            None => vec![],
        };
        if raw.is_empty() {
            raw = parse_state_products(&html);
        }
        raw.truncate(MAX_PRODUCTS_PER_SEARCH);
        let now = Utc::now();
        Ok(raw
            .into_iter()
            .map(|p| to_product(retailer, p, category, term, now))
            .collect())
    }

    /// Free-text search at `targets`, live first. Falls back to recorded
    /// catalog entries matching `term` when nothing live is found.
    pub async fn search(&self, term: &str, targets: &[&RetailerConfig]) -> Vec<Product> {
        let term = term.trim();
        if term.is_empty() {
            return vec![];
        }
        let mut found = Vec::new();
        if self.source.automation_enabled() {
            for retailer in targets {
                match self
                    .search_retailer(retailer, SEARCH_RESULT_CATEGORY, term)
                    .await
                {
                    Ok(products) => found.extend(products),
                    Err(e) => {
                        tracing::warn!(retailer = %retailer.id, term, error = %e, "product search failed");
                    }
                }
            }
        }
        let found = dedup_products(found);
        if !found.is_empty() {
            return found;
        }
        let fallback: Vec<Product> = targets
            .iter()
            .flat_map(|r| self.fallback.products(&r.id))
            .filter(|p| p.matches_term(term))
            .collect();
        tracing::info!(term, count = fallback.len(), "using fallback catalog for search");
        fallback
    }
}

fn to_product(
    retailer: &RetailerConfig,
    raw: RawProduct,
    category: &str,
    term: &str,
    now: DateTime<Utc>,
) -> Product {
    Product {
        id: product_id(&retailer.id, &raw.name),
        retailer_id: retailer.id.clone(),
        description: raw.name.clone(),
        name: raw.name,
        brand: raw.brand,
        category: category.to_string(),
        subcategory: term.to_string(),
        price: raw.price,
        currency: ProductPriceQuote::CURRENCY.to_string(),
        in_stock: raw.in_stock,
        product_url: raw.product_url,
        image_url: raw.image_url,
        search_term: Some(term.to_string()),
        provenance: Provenance::LiveFetch,
        last_updated: now,
    }
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
