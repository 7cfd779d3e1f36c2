//! In-memory [`PageSource`] for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::ScraperError;
use crate::page::PageSource;

/// Serves canned pages by exact URL. Anything not registered is a 404.
#[derive(Default)]
pub(crate) struct FakePageSource {
    pub disabled: bool,
    pub ping_status: Option<u16>,
    pub ping_fails: bool,
    pub html: HashMap<String, String>,
    pub json: HashMap<String, serde_json::Value>,
    pub requests: Mutex<Vec<String>>,
}

impl FakePageSource {
    pub fn disabled() -> Self {
        Self {
            disabled: true,
            ..Self::default()
        }
    }

    /// Reachable site where every page request fails.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn with_html(mut self, url: &str, body: &str) -> Self {
        self.html.insert(url.to_string(), body.to_string());
        self
    }

    pub fn with_json(mut self, url: &str, body: serde_json::Value) -> Self {
        self.json.insert(url.to_string(), body);
        self
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or_default()
    }

    fn record(&self, url: &str) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
    }

    fn not_found(url: &str) -> ScraperError {
        ScraperError::UnexpectedStatus {
            status: 404,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl PageSource for FakePageSource {
    fn automation_enabled(&self) -> bool {
        !self.disabled
    }

    async fn ping(&self, url: &str) -> Result<u16, ScraperError> {
        self.record(url);
        if self.ping_fails {
            return Err(ScraperError::RetailerUnreachable {
                retailer: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(self.ping_status.unwrap_or(200))
    }

    async fn fetch_html(&self, url: &str) -> Result<String, ScraperError> {
        self.record(url);
        self.html.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }

    async fn fetch_json(&self, url: &str) -> Result<serde_json::Value, ScraperError> {
        self.record(url);
        self.json.get(url).cloned().ok_or_else(|| Self::not_found(url))
    }
}
