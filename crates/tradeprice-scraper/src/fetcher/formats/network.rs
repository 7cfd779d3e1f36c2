//! Strategy 2: JSON endpoints, either configured for the retailer or
//! referenced from the locator page's own scripts.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tradeprice_core::RetailerConfig;
use url::Url;

use super::embed::store_records;
use crate::error::ScraperError;
use crate::page::PageSource;

const MAX_DISCOVERED_ENDPOINTS: usize = 5;

const SKIPPED_EXTENSIONS: [&str; 7] = [".css", ".js", ".png", ".jpg", ".jpeg", ".svg", ".ico"];

static ENDPOINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)["']((?:https?://|/)[^"'\s<>]*(?:store|location|api)[^"'\s<>]*)["']"#)
        .expect("valid regex")
});

/// Absolute URLs in `html` that look like store data endpoints.
///
/// Static assets are skipped, relative paths are resolved against
/// `page_url`, and at most a handful are returned.
pub(in crate::fetcher) fn discover_endpoints(html: &str, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return vec![];
    };
    let mut seen = HashSet::new();
    ENDPOINT_RE
        .captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str())
        .filter(|candidate| {
            let path = candidate.split(['?', '#']).next().unwrap_or_default();
            let lower = path.to_ascii_lowercase();
            !SKIPPED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .filter_map(|candidate| base.join(candidate).ok())
        .map(String::from)
        .filter(|url| url != page_url && seen.insert(url.clone()))
        .take(MAX_DISCOVERED_ENDPOINTS)
        .collect()
}

/// Fetch every candidate endpoint and union the store records they return.
///
/// Individual endpoint failures are skipped. An error is returned only when
/// every endpoint failed.
pub(in crate::fetcher) async fn fetch_network_stores(
    source: &dyn PageSource,
    retailer: &RetailerConfig,
    html: &str,
) -> Result<Vec<Value>, ScraperError> {
    let mut endpoints: Vec<String> = retailer
        .api_endpoints
        .iter()
        .filter_map(|e| {
            Url::parse(&retailer.base_url)
                .and_then(|base| base.join(e))
                .ok()
        })
        .map(String::from)
        .collect();
    for url in discover_endpoints(html, &retailer.store_locator_url) {
        if !endpoints.contains(&url) {
            endpoints.push(url);
        }
    }

    let mut records = Vec::new();
    let mut last_error = None;
    let mut any_ok = false;
    for endpoint in &endpoints {
        match source.fetch_json(endpoint).await {
            Ok(body) => {
                any_ok = true;
                let found = store_records(body);
                tracing::debug!(
                    retailer = %retailer.id,
                    %endpoint,
                    count = found.len(),
                    "queried store endpoint"
                );
                records.extend(found);
            }
            Err(e) => {
                tracing::debug!(retailer = %retailer.id, %endpoint, error = %e, "store endpoint failed");
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if !any_ok => Err(e),
        _ => Ok(records),
    }
}
