//! Store and price collection for NZ trade retailers.
//!
//! [`StoreFetcher`] walks a retailer's locator page through a fixed list of
//! extraction strategies and falls back to recorded store data, so every
//! retailer always yields stores. [`Orchestrator`] runs it across the whole
//! retailer table, [`ProductCatalog`] browses category searches, and
//! [`PriceService`] puts TTL caches and refresh guards in front of them.

pub mod catalog;
pub mod error;
pub mod fallback;
pub mod fetcher;
pub mod guard;
pub mod normalize;
pub mod orchestrator;
pub mod page;
pub mod prices;
pub mod service;
pub mod validate;

#[cfg(test)]
mod testing;

pub use catalog::{CatalogRefresh, ProductCatalog, MAX_PRODUCTS_PER_SEARCH};
pub use error::ScraperError;
pub use fallback::{FallbackProvider, FallbackQuote};
pub use fetcher::{FallbackReason, FetchOutcome, StoreFetcher, Strategy};
pub use guard::{price_guard_key, RefreshGuards, RefreshPermit, PRODUCTS_KEY, STORES_KEY};
pub use orchestrator::{AggregateResult, Orchestrator, RetailerError, RetailerResult};
pub use page::{HttpPageSource, PageSource};
pub use prices::{PriceOutcome, PriceSearcher, RawProduct};
pub use service::{
    get_cached_or_refresh, CacheStatus, PriceService, RefreshSummary, ServiceOptions,
    SweepCounts,
};
pub use validate::{is_strictly_valid, validate_stores, ValidationSummary};
