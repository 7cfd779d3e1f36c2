//! Cached read path over the orchestrator, price searcher and catalog.
//!
//! One [`PriceService`] is built at startup and shared by the HTTP handlers,
//! the scheduler and the CLI. Store lists, price quotes and catalog entries
//! are served from TTL caches and only re-fetched when missing, expired or
//! forced. Every re-fetch holds the data set's refresh guard; a forced
//! request that finds it held fails with [`ScraperError::RefreshInProgress`]
//! and a plain read is answered from fallback data without caching.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tradeprice_core::{
    filter_products, AppConfig, CacheStats, CategoryTable, Clock, MatchQuery, Product,
    ProductPriceQuote, RetailerConfig, RetailersFile, StoreLocation, SystemClock, TtlCache,
};

use crate::catalog::{CatalogRefresh, ProductCatalog};
use crate::error::ScraperError;
use crate::fallback::FallbackProvider;
use crate::fetcher::StoreFetcher;
use crate::guard::{price_guard_key, RefreshGuards, RefreshPermit, PRODUCTS_KEY, STORES_KEY};
use crate::orchestrator::{dedup_stores, AggregateResult, Orchestrator, RetailerError};
use crate::page::{HttpPageSource, PageSource};
use crate::prices::PriceSearcher;

const ALL_STORES_KEY: &str = "stores:all";
const ALL_PRODUCTS_KEY: &str = "products:all";

/// Recently searched products kept for the scheduled price refresh.
const MAX_RECENT_QUERIES: usize = 20;

fn store_key(retailer: &str) -> String {
    format!("stores:{retailer}")
}

fn price_key(retailer: &str, query: &MatchQuery) -> String {
    format!("prices:{retailer}:{}", query.cache_key())
}

fn product_key(category: &str) -> String {
    format!("products:{}", category.trim().to_lowercase())
}

/// Return the cached value for `key`, or run `refresh`, cache its result
/// for `ttl` and return it.
pub async fn get_cached_or_refresh<T, F, Fut>(
    cache: &TtlCache<T>,
    key: &str,
    ttl: Duration,
    refresh: F,
) -> T
where
    T: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    if let Some(value) = cache.get(key) {
        tracing::debug!(key, "cache hit");
        return value;
    }
    tracing::debug!(key, "cache miss, refreshing");
    let value = refresh().await;
    cache.put(key, value.clone(), ttl);
    value
}

#[derive(Debug, Clone, Copy)]
pub struct ServiceOptions {
    pub store_ttl: Duration,
    pub price_ttl: Duration,
    pub product_ttl: Duration,
    /// Floor for the pause between retailers during a full store refresh.
    pub min_delay: std::time::Duration,
}

impl ServiceOptions {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            store_ttl: config.store_cache_ttl(),
            price_ttl: config.price_cache_ttl(),
            product_ttl: config.product_cache_ttl(),
            min_delay: std::time::Duration::from_millis(config.inter_retailer_delay_ms),
        }
    }
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            store_ttl: Duration::hours(24),
            price_ttl: Duration::minutes(30),
            product_ttl: Duration::hours(24),
            min_delay: std::time::Duration::ZERO,
        }
    }
}

/// Outcome of the most recent full store refresh, without the stores.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub successful_retailers: Vec<String>,
    pub errors: Vec<RetailerError>,
    pub duration_ms: u64,
}

impl RefreshSummary {
    fn new(result: &AggregateResult, finished_at: DateTime<Utc>) -> Self {
        Self {
            finished_at,
            total: result.total,
            successful_retailers: result.successful_retailers.clone(),
            errors: result.errors.clone(),
            duration_ms: result.duration_ms,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub stores: CacheStats,
    pub prices: CacheStats,
    pub products: CacheStats,
    /// Valid entries over all entries, across every cache.
    pub hit_rate: f64,
    pub last_store_refresh: Option<DateTime<Utc>>,
    pub last_price_refresh: Option<DateTime<Utc>>,
    pub last_product_refresh: Option<DateTime<Utc>>,
    pub last_refresh: Option<RefreshSummary>,
}

/// Entries removed from each cache by one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepCounts {
    pub stores: usize,
    pub prices: usize,
    pub products: usize,
}

impl SweepCounts {
    #[must_use]
    pub fn total(&self) -> usize {
        self.stores + self.prices + self.products
    }
}

#[derive(Default)]
struct History {
    recent_queries: VecDeque<MatchQuery>,
    last_price_refresh: Option<DateTime<Utc>>,
    last_product_refresh: Option<DateTime<Utc>>,
    last_refresh: Option<RefreshSummary>,
}

pub struct PriceService {
    retailers: Arc<RetailersFile>,
    orchestrator: Orchestrator,
    searcher: PriceSearcher,
    catalog: ProductCatalog,
    fallback: Arc<FallbackProvider>,
    store_cache: TtlCache<Vec<StoreLocation>>,
    price_cache: TtlCache<Vec<ProductPriceQuote>>,
    product_cache: TtlCache<Vec<Product>>,
    options: ServiceOptions,
    clock: Arc<dyn Clock>,
    guards: Arc<RefreshGuards>,
    history: Mutex<History>,
}

impl PriceService {
    #[must_use]
    pub fn new(
        retailers: Arc<RetailersFile>,
        categories: Arc<CategoryTable>,
        source: Arc<dyn PageSource>,
        fallback: Arc<FallbackProvider>,
        options: ServiceOptions,
    ) -> Self {
        Self::with_clock(
            retailers,
            categories,
            source,
            fallback,
            options,
            Arc::new(SystemClock),
        )
    }

    /// Like [`PriceService::new`] with every cache reading `clock`.
    #[must_use]
    pub fn with_clock(
        retailers: Arc<RetailersFile>,
        categories: Arc<CategoryTable>,
        source: Arc<dyn PageSource>,
        fallback: Arc<FallbackProvider>,
        options: ServiceOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let fetcher = StoreFetcher::new(source.clone(), fallback.clone());
        Self {
            orchestrator: Orchestrator::new(retailers.clone(), fetcher, options.min_delay),
            catalog: ProductCatalog::new(
                retailers.clone(),
                categories,
                source.clone(),
                fallback.clone(),
                options.min_delay,
            ),
            searcher: PriceSearcher::new(source, fallback.clone()),
            fallback,
            store_cache: TtlCache::with_clock(clock.clone()),
            price_cache: TtlCache::with_clock(clock.clone()),
            product_cache: TtlCache::with_clock(clock.clone()),
            clock,
            guards: Arc::new(RefreshGuards::default()),
            retailers,
            options,
            history: Mutex::new(History::default()),
        }
    }

    /// Build the production service: HTTP page source, the configured
    /// retailer table and the embedded fallback data.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Config`] if the retailer table or fallback
    /// data cannot be loaded, or [`ScraperError::Http`] if the HTTP client
    /// cannot be built.
    pub fn from_config(config: &AppConfig) -> Result<Self, ScraperError> {
        let retailers = Arc::new(RetailersFile::load(config.retailers_path.as_deref())?);
        let categories = Arc::new(CategoryTable::embedded()?);
        let fallback = Arc::new(FallbackProvider::embedded()?);
        let source = Arc::new(HttpPageSource::new(
            config.request_timeout_secs,
            config.ping_timeout_secs,
            &config.user_agent,
            config.automation_enabled,
        )?);
        Ok(Self::new(
            retailers,
            categories,
            source,
            fallback,
            ServiceOptions::from_config(config),
        ))
    }

    #[must_use]
    pub fn retailers(&self) -> &RetailersFile {
        &self.retailers
    }

    #[must_use]
    pub fn guards(&self) -> &Arc<RefreshGuards> {
        &self.guards
    }

    /// Guard keys of refreshes running right now, sorted.
    #[must_use]
    pub fn refreshing(&self) -> Vec<String> {
        self.guards.running()
    }

    #[must_use]
    pub fn category_ids(&self) -> Vec<&str> {
        self.catalog.categories().ids()
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn retailer(&self, id: &str) -> Result<&RetailerConfig, ScraperError> {
        self.retailers
            .get(id)
            .ok_or_else(|| ScraperError::UnknownRetailer(id.to_string()))
    }

    /// Answer for a store read that found the stores guard held.
    fn stores_while_refreshing(
        &self,
        retailer: Option<&str>,
        force: bool,
    ) -> Result<Vec<StoreLocation>, ScraperError> {
        if force {
            return Err(ScraperError::RefreshInProgress(STORES_KEY.to_string()));
        }
        let stores = match retailer {
            Some(id) => self.fallback.stores(id),
            None => dedup_stores(
                self.retailers
                    .retailers
                    .iter()
                    .flat_map(|r| self.fallback.stores(&r.id))
                    .collect(),
            ),
        };
        tracing::info!(
            retailer = retailer.unwrap_or("all"),
            count = stores.len(),
            "store refresh in progress, serving fallback stores"
        );
        Ok(stores)
    }

    /// Stores for one retailer.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownRetailer`] for an id not in the table,
    /// or [`ScraperError::RefreshInProgress`] when `force` is set while
    /// another store refresh runs.
    pub async fn fetch_stores(
        &self,
        retailer_id: &str,
        force: bool,
    ) -> Result<Vec<StoreLocation>, ScraperError> {
        let retailer = self.retailer(retailer_id)?;
        let key = store_key(&retailer.id);
        if !force {
            if let Some(stores) = self.store_cache.get(&key) {
                return Ok(stores);
            }
        }
        let Some(_permit) = self.guards.try_acquire(STORES_KEY) else {
            return self.stores_while_refreshing(Some(&retailer.id), force);
        };
        if force {
            self.store_cache.remove(&key);
        }
        let ttl = self.options.store_ttl;
        let stores = get_cached_or_refresh(&self.store_cache, &key, ttl, move || async move {
            match self.orchestrator.refresh_one(&retailer.id).await {
                Ok(result) => result.stores,
                Err(e) => {
                    tracing::error!(retailer = %retailer.id, error = %e, "store refresh failed");
                    vec![]
                }
            }
        })
        .await;
        Ok(stores)
    }

    /// The merged store list across every retailer.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::RefreshInProgress`] when `force` is set while
    /// another store refresh runs.
    pub async fn fetch_all_stores(&self, force: bool) -> Result<Vec<StoreLocation>, ScraperError> {
        if !force {
            if let Some(stores) = self.store_cache.get(ALL_STORES_KEY) {
                return Ok(stores);
            }
        }
        let Some(permit) = self.guards.try_acquire(STORES_KEY) else {
            return self.stores_while_refreshing(None, force);
        };
        Ok(self.refresh_all_stores_held(&permit).await.stores)
    }

    /// Cached merged stores, refreshed on a miss.
    async fn all_stores(&self) -> Vec<StoreLocation> {
        self.fetch_all_stores(false).await.unwrap_or_default()
    }

    /// Run a full store refresh and repopulate the merged and per-retailer
    /// cache entries.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::RefreshInProgress`] if a store refresh is
    /// already running.
    pub async fn refresh_all_stores(&self) -> Result<AggregateResult, ScraperError> {
        let permit = self
            .guards
            .try_acquire(STORES_KEY)
            .ok_or_else(|| ScraperError::RefreshInProgress(STORES_KEY.to_string()))?;
        Ok(self.refresh_all_stores_held(&permit).await)
    }

    async fn refresh_all_stores_held(&self, _permit: &RefreshPermit) -> AggregateResult {
        let result = self.orchestrator.refresh_all().await;
        let ttl = self.options.store_ttl;
        for retailer in &self.retailers.retailers {
            let stores: Vec<StoreLocation> = result
                .stores
                .iter()
                .filter(|s| s.chain == retailer.id)
                .cloned()
                .collect();
            if !stores.is_empty() {
                self.store_cache.put(store_key(&retailer.id), stores, ttl);
            }
        }
        self.store_cache.put(ALL_STORES_KEY, result.stores.clone(), ttl);
        self.history().last_refresh = Some(RefreshSummary::new(&result, self.clock.now()));
        result
    }

    /// Merged stores whose region matches `region`, ignoring case.
    pub async fn stores_by_region(&self, region: &str) -> Vec<StoreLocation> {
        let region = region.trim();
        self.all_stores()
            .await
            .into_iter()
            .filter(|s| s.address.region.eq_ignore_ascii_case(region))
            .collect()
    }

    /// Merged stores for distance ranking.
    pub async fn stores_for_ranking(&self) -> Vec<StoreLocation> {
        self.all_stores().await
    }

    /// Price quotes for `query` from `retailers`, or every retailer when
    /// `None`, ordered by ascending price.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownRetailer`] if any requested id is not
    /// in the table; nothing is fetched in that case. Returns
    /// [`ScraperError::RefreshInProgress`] when `force` is set while the same
    /// query is being refreshed.
    pub async fn fetch_prices(
        &self,
        query: &MatchQuery,
        retailers: Option<&[String]>,
        force: bool,
    ) -> Result<Vec<ProductPriceQuote>, ScraperError> {
        let targets: Vec<&RetailerConfig> = match retailers {
            Some(ids) => ids
                .iter()
                .map(|id| self.retailer(id))
                .collect::<Result<_, _>>()?,
            None => self.retailers.retailers.iter().collect(),
        };
        self.remember_query(query);

        let mut quotes = Vec::new();
        let mut misses = Vec::new();
        for retailer in targets {
            let key = price_key(&retailer.id, query);
            match self.price_cache.get(&key) {
                Some(found) if !force => quotes.extend(found),
                _ => misses.push((retailer, key)),
            }
        }

        if !misses.is_empty() {
            let guard_key = price_guard_key(query);
            match self.guards.try_acquire(guard_key.as_str()) {
                Some(_permit) => {
                    let ttl = self.options.price_ttl;
                    for (retailer, key) in misses {
                        if force {
                            self.price_cache.remove(&key);
                        }
                        let found =
                            get_cached_or_refresh(&self.price_cache, &key, ttl, move || async move {
                                self.history().last_price_refresh = Some(self.clock.now());
                                self.searcher.search(retailer, query).await.quotes
                            })
                            .await;
                        quotes.extend(found);
                    }
                }
                None if force => return Err(ScraperError::RefreshInProgress(guard_key)),
                None => {
                    for (retailer, _) in misses {
                        let outcome = self.searcher.fall_back(retailer, query, "refresh in progress");
                        quotes.extend(outcome.quotes);
                    }
                }
            }
        }
        quotes.sort_by(|a, b| a.price.cmp(&b.price));
        Ok(quotes)
    }

    /// Catalog entries in `category`, or all of them when `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::RefreshInProgress`] when `force` is set while
    /// a catalog refresh runs.
    pub async fn fetch_products(
        &self,
        category: Option<&str>,
        force: bool,
    ) -> Result<Vec<Product>, ScraperError> {
        let category = category.map(str::trim).filter(|c| !c.is_empty());
        if !force {
            if let Some(products) = category.and_then(|c| self.product_cache.get(&product_key(c))) {
                return Ok(products);
            }
            if let Some(all) = self.product_cache.get(ALL_PRODUCTS_KEY) {
                return Ok(filter_products(&all, category, None));
            }
        }
        let Some(permit) = self.guards.try_acquire(PRODUCTS_KEY) else {
            if force {
                return Err(ScraperError::RefreshInProgress(PRODUCTS_KEY.to_string()));
            }
            let products = filter_products(&self.catalog.fallback_products(), category, None);
            tracing::info!(
                count = products.len(),
                "catalog refresh in progress, serving fallback products"
            );
            return Ok(products);
        };
        let refresh = self.refresh_products_held(&permit).await;
        Ok(filter_products(&refresh.products, category, None))
    }

    /// Rebuild the catalog and its per-category cache entries.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::RefreshInProgress`] if a catalog refresh is
    /// already running.
    pub async fn refresh_products(&self) -> Result<CatalogRefresh, ScraperError> {
        let permit = self
            .guards
            .try_acquire(PRODUCTS_KEY)
            .ok_or_else(|| ScraperError::RefreshInProgress(PRODUCTS_KEY.to_string()))?;
        Ok(self.refresh_products_held(&permit).await)
    }

    async fn refresh_products_held(&self, _permit: &RefreshPermit) -> CatalogRefresh {
        let refresh = self.catalog.scrape_all().await;
        let ttl = self.options.product_ttl;
        for category in self.catalog.categories().ids() {
            let products = filter_products(&refresh.products, Some(category), None);
            self.product_cache.put(product_key(category), products, ttl);
        }
        self.product_cache
            .put(ALL_PRODUCTS_KEY, refresh.products.clone(), ttl);
        self.history().last_product_refresh = Some(self.clock.now());
        refresh
    }

    /// Free-text product search at `retailers`, or every retailer when
    /// `None`. Results are not cached.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::UnknownRetailer`] if any requested id is not
    /// in the table.
    pub async fn search_products(
        &self,
        term: &str,
        retailers: Option<&[String]>,
    ) -> Result<Vec<Product>, ScraperError> {
        let targets: Vec<&RetailerConfig> = match retailers {
            Some(ids) => ids
                .iter()
                .map(|id| self.retailer(id))
                .collect::<Result<_, _>>()?,
            None => self.retailers.retailers.iter().collect(),
        };
        Ok(self.catalog.search(term, &targets).await)
    }

    fn remember_query(&self, query: &MatchQuery) {
        let key = query.cache_key();
        let mut history = self.history();
        history.recent_queries.retain(|q| q.cache_key() != key);
        history.recent_queries.push_back(query.clone());
        while history.recent_queries.len() > MAX_RECENT_QUERIES {
            history.recent_queries.pop_front();
        }
    }

    /// Recently searched products, oldest first.
    #[must_use]
    pub fn recent_queries(&self) -> Vec<MatchQuery> {
        self.history().recent_queries.iter().cloned().collect()
    }

    /// Drop expired entries from every cache.
    pub fn sweep_expired(&self) -> SweepCounts {
        SweepCounts {
            stores: self.store_cache.sweep_expired(),
            prices: self.price_cache.sweep_expired(),
            products: self.product_cache.sweep_expired(),
        }
    }

    pub fn sweep_expired_prices(&self) -> usize {
        self.price_cache.sweep_expired()
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn cache_status(&self) -> CacheStatus {
        let stores = self.store_cache.stats();
        let prices = self.price_cache.stats();
        let products = self.product_cache.stats();
        let total = stores.total + prices.total + products.total;
        let valid = stores.valid + prices.valid + products.valid;
        let history = self.history();
        CacheStatus {
            stores,
            prices,
            products,
            hit_rate: valid as f64 / total.max(1) as f64,
            last_store_refresh: self.store_cache.written_at(ALL_STORES_KEY),
            last_price_refresh: history.last_price_refresh,
            last_product_refresh: history.last_product_refresh,
            last_refresh: history.last_refresh.clone(),
        }
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
