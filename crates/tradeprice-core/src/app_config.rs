use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Retailer table override; `None` uses the embedded table.
    pub retailers_path: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// Timeout for the reachability ping sent before any strategy runs.
    pub ping_timeout_secs: u64,
    pub user_agent: String,
    /// Floor for the pause between retailers; a retailer's own
    /// `rate_limit_ms` applies when larger.
    pub inter_retailer_delay_ms: u64,
    pub store_cache_ttl_minutes: i64,
    pub price_cache_ttl_minutes: i64,
    pub product_cache_ttl_minutes: i64,
    /// When false, every fetch short-circuits to fallback data.
    pub automation_enabled: bool,
    pub scheduler_enabled: bool,
}

impl AppConfig {
    #[must_use]
    pub fn store_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.store_cache_ttl_minutes)
    }

    #[must_use]
    pub fn price_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.price_cache_ttl_minutes)
    }

    #[must_use]
    pub fn product_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.product_cache_ttl_minutes)
    }
}
