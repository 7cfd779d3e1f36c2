use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid CSS selector \"{selector}\": {reason}")]
    Selector { selector: String, reason: String },

    #[error("page automation is unavailable in this environment")]
    AutomationUnavailable,

    #[error("retailer {retailer} unreachable: {reason}")]
    RetailerUnreachable { retailer: String, reason: String },

    #[error("refresh already in progress: {0}")]
    RefreshInProgress(String),

    #[error("unknown retailer: {0}")]
    UnknownRetailer(String),

    #[error("configuration error: {0}")]
    Config(#[from] tradeprice_core::ConfigError),
}
