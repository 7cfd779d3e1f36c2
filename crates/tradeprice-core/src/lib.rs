pub mod app_config;
pub mod cache;
pub mod catalog;
mod config;
pub mod geo;
pub mod matcher;
pub mod retailers;
pub mod types;

pub use app_config::{AppConfig, Environment};
pub use cache::{CacheStats, Clock, ManualClock, SystemClock, TtlCache};
pub use catalog::{
    dedup_products, filter_products, Category, CategoryTable, SEARCH_TERMS_PER_CATEGORY,
};
pub use config::{load_app_config, load_app_config_from_env};
pub use geo::{distance_km, AreaTable, BoundingBox, Coordinate, GeoArea};
pub use matcher::{rank_candidates, score, MatchCandidate, MatchQuery, MIN_MATCH_SCORE};
pub use retailers::{load_retailers, RetailerConfig, RetailersFile};
pub use types::{
    Address, DayHours, Product, ProductPriceQuote, Provenance, StoreCoordinates, StoreLocation,
    WeeklyHours,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read retailers file {path}: {source}")]
    RetailersFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse retailers file: {0}")]
    RetailersFileParse(#[source] serde_yaml::Error),

    #[error("failed to parse fixture {name}: {source}")]
    FixtureParse {
        name: &'static str,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("configuration validation failed: {0}")]
    Validation(String),
}
