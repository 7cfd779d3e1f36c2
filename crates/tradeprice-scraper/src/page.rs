//! Access to retailer pages.
//!
//! The fetcher only talks to a [`PageSource`], so tests and environments
//! without page automation can substitute their own implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::error::ScraperError;

#[async_trait]
pub trait PageSource: Send + Sync {
    /// Whether pages can be loaded at all. When false every fetch goes
    /// straight to fallback data.
    fn automation_enabled(&self) -> bool;

    /// Cheap reachability check. Returns the HTTP status.
    async fn ping(&self, url: &str) -> Result<u16, ScraperError>;

    /// Fetch an HTML document.
    async fn fetch_html(&self, url: &str) -> Result<String, ScraperError>;

    /// Fetch and parse a JSON document.
    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, ScraperError>;
}

/// [`PageSource`] backed by plain HTTP requests.
pub struct HttpPageSource {
    client: Client,
    ping_timeout: Duration,
    enabled: bool,
}

impl HttpPageSource {
    /// # Errors
    ///
    /// Returns [`ScraperError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        request_timeout_secs: u64,
        ping_timeout_secs: u64,
        user_agent: &str,
        enabled: bool,
    ) -> Result<Self, ScraperError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            ping_timeout: Duration::from_secs(ping_timeout_secs),
            enabled,
        })
    }

    async fn get_ok(&self, url: &str, accept: &str) -> Result<reqwest::Response, ScraperError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, accept)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-NZ,en;q=0.9")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScraperError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    fn automation_enabled(&self) -> bool {
        self.enabled
    }

    async fn ping(&self, url: &str) -> Result<u16, ScraperError> {
        let response = self
            .client
            .head(url)
            .timeout(self.ping_timeout)
            .send()
            .await?;
        Ok(response.status().as_u16())
    }

    async fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        let response = self
            .get_ok(url, "text/html,application/xhtml+xml")
            .await?;
        Ok(response.text().await?)
    }

    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, ScraperError> {
        let response = self.get_ok(url, "application/json").await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| ScraperError::Deserialize {
            context: url.to_string(),
            source,
        })
    }
}
