//! Strategy 4: re-request the locator page once per value of its own
//! region/area filter.

use scraper::Html;
use serde_json::Value;
use tradeprice_core::RetailerConfig;

use super::visible::{fetch_visible_pages, parse_selector};
use crate::error::ScraperError;
use crate::page::PageSource;

const MAX_FILTER_VALUES: usize = 5;

const FILTER_SELECT: &str = r#"select[name*="region"], select[name*="area"], select[name*="location"], select[id*="region"], select[id*="location"]"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(in crate::fetcher) struct FilterControl {
    pub param: String,
    pub values: Vec<String>,
}

/// Find the page's filter `<select>` and its first few non-empty option
/// values. The query parameter is the select's `name`, else `default_param`.
pub(in crate::fetcher) fn find_filter(
    html: &str,
    default_param: Option<&str>,
) -> Result<Option<FilterControl>, ScraperError> {
    let select = parse_selector(FILTER_SELECT)?;
    let option = parse_selector("option")?;
    let document = Html::parse_document(html);

    let Some(control) = document.select(&select).next() else {
        return Ok(None);
    };
    let param = control
        .value()
        .attr("name")
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .or(default_param);
    let Some(param) = param else {
        return Ok(None);
    };

    let values: Vec<String> = control
        .select(&option)
        .filter_map(|o| o.value().attr("value"))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .take(MAX_FILTER_VALUES)
        .map(str::to_string)
        .collect();
    if values.is_empty() {
        return Ok(None);
    }
    Ok(Some(FilterControl {
        param: param.to_string(),
        values,
    }))
}

/// Apply each filter value to the locator URL and union the store cards.
pub(in crate::fetcher) async fn fetch_filtered_stores(
    source: &dyn PageSource,
    retailer: &RetailerConfig,
    html: &str,
) -> Result<Vec<Value>, ScraperError> {
    let Some(filter) = find_filter(html, retailer.filter_param.as_deref())? else {
        return Ok(vec![]);
    };
    tracing::debug!(
        retailer = %retailer.id,
        param = %filter.param,
        values = filter.values.len(),
        "detected store filter"
    );
    let urls: Vec<String> = filter
        .values
        .iter()
        .map(|v| retailer.locator_url_with(&filter.param, v))
        .collect();
    fetch_visible_pages(source, &urls, &retailer.store_selectors).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_select_supplies_param_and_values() {
        let html = r#"
            <select name="storeRegion">
              <option value="">Choose a region</option>
              <option value="auckland">Auckland</option>
              <option value="waikato">Waikato</option>
              <option value="bop">Bay of Plenty</option>
              <option value="wellington">Wellington</option>
              <option value="canterbury">Canterbury</option>
              <option value="otago">Otago</option>
            </select>
        "#;
        let filter = find_filter(html, Some("region")).expect("parse").expect("filter");
        assert_eq!(filter.param, "storeRegion");
        assert_eq!(
            filter.values,
            vec!["auckland", "waikato", "bop", "wellington", "canterbury"]
        );
    }

    #[test]
    fn unnamed_select_uses_configured_param() {
        let html = r#"<select id="location-filter"><option value="akl">Auckland</option></select>"#;
        let filter = find_filter(html, Some("region")).expect("parse").expect("filter");
        assert_eq!(filter.param, "region");
        assert!(find_filter(html, None).expect("parse").is_none());
    }

    #[test]
    fn unrelated_or_empty_selects_are_ignored() {
        let sort = r#"<select name="sort"><option value="az">A-Z</option></select>"#;
        assert!(find_filter(sort, Some("region")).expect("parse").is_none());
        let empty = r#"<select name="region"><option value="">Any</option></select>"#;
        assert!(find_filter(empty, Some("region")).expect("parse").is_none());
    }
}
