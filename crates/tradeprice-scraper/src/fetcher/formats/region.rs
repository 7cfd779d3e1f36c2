//! Strategy 5: one locator request per configured region term.

use serde_json::Value;
use tradeprice_core::RetailerConfig;

use super::visible::fetch_visible_pages;
use crate::error::ScraperError;
use crate::page::PageSource;

/// Query parameter carrying the region term on locator URLs.
const REGION_SEARCH_PARAM: &str = "location";

pub(in crate::fetcher) fn region_urls(retailer: &RetailerConfig) -> Vec<String> {
    retailer
        .region_search
        .iter()
        .map(|term| retailer.locator_url_with(REGION_SEARCH_PARAM, term))
        .collect()
}

pub(in crate::fetcher) async fn fetch_region_stores(
    source: &dyn PageSource,
    retailer: &RetailerConfig,
) -> Result<Vec<Value>, ScraperError> {
    let urls = region_urls(retailer);
    if urls.is_empty() {
        return Ok(vec![]);
    }
    fetch_visible_pages(source, &urls, &retailer.store_selectors).await
}

#[cfg(test)]
mod tests {
    use tradeprice_core::RetailersFile;

    use super::*;

    #[test]
    fn one_url_per_region_term() {
        let retailers = RetailersFile::embedded().expect("retailers");
        let bunnings = retailers.get("bunnings").expect("bunnings");
        let urls = region_urls(bunnings);
        assert_eq!(urls.len(), 6);
        assert_eq!(urls[0], "https://www.bunnings.co.nz/stores?location=Auckland");
        assert_eq!(urls[5], "https://www.bunnings.co.nz/stores?location=Dunedin");
    }
}
