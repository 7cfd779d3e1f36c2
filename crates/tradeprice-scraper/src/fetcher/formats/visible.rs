//! Strategy 3: store cards rendered in the locator page markup.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use tradeprice_core::retailers::StoreSelectors;

use crate::error::ScraperError;
use crate::page::PageSource;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\+64\s?|\(0\d\)\s?|\d{2}\s?)\d{3}\s?\d{4}").expect("valid regex")
});

const LAT_ATTRS: [&str; 2] = ["data-lat", "data-latitude"];
const LNG_ATTRS: [&str; 3] = ["data-lng", "data-longitude", "data-lon"];

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, ScraperError> {
    Selector::parse(selector).map_err(|e| ScraperError::Selector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

/// Element text with whitespace runs collapsed.
pub(crate) fn element_text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(container: ElementRef<'_>, selector: &Selector) -> Option<String> {
    container
        .select(selector)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn first_attr(container: ElementRef<'_>, attrs: &[&str]) -> Option<String> {
    attrs
        .iter()
        .find_map(|a| container.value().attr(a))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Parse every store card in `html` into a raw JSON record keyed the same
/// way as the default field map (`name`, `address`, `phone`, `suburb`,
/// `lat`, `lng`). Cards without a name are skipped.
///
/// # Errors
///
/// Returns [`ScraperError::Selector`] if a configured selector does not parse.
pub(in crate::fetcher) fn extract_visible_stores(
    html: &str,
    selectors: &StoreSelectors,
) -> Result<Vec<Value>, ScraperError> {
    let container = parse_selector(&selectors.container)?;
    let name = parse_selector(&selectors.name)?;
    let address = parse_selector(&selectors.address)?;
    let phone = parse_selector(&selectors.phone)?;
    let suburb = selectors
        .suburb
        .as_deref()
        .map(parse_selector)
        .transpose()?;

    let document = Html::parse_document(html);
    let mut records = Vec::new();
    for card in document.select(&container) {
        let Some(store_name) = first_text(card, &name) else {
            continue;
        };
        let mut record = Map::new();
        record.insert("name".into(), Value::String(store_name));

        if let Some(text) = first_text(card, &address) {
            record.insert("address".into(), Value::String(text));
        }
        let phone_text = first_text(card, &phone).or_else(|| {
            PHONE_RE
                .find(&element_text(card))
                .map(|m| m.as_str().to_string())
        });
        if let Some(text) = phone_text {
            record.insert("phone".into(), Value::String(text));
        }
        if let Some(text) = suburb.as_ref().and_then(|s| first_text(card, s)) {
            record.insert("suburb".into(), Value::String(text));
        }
        if let (Some(lat), Some(lng)) = (first_attr(card, &LAT_ATTRS), first_attr(card, &LNG_ATTRS)) {
            record.insert("lat".into(), Value::String(lat));
            record.insert("lng".into(), Value::String(lng));
        }
        records.push(Value::Object(record));
    }
    Ok(records)
}

/// Fetch each URL and union the store cards found on them.
///
/// Pages that fail to load are skipped; an error is returned only when none
/// loaded.
pub(in crate::fetcher) async fn fetch_visible_pages(
    source: &dyn PageSource,
    urls: &[String],
    selectors: &StoreSelectors,
) -> Result<Vec<Value>, ScraperError> {
    let mut records = Vec::new();
    let mut last_error = None;
    let mut any_ok = false;
    for url in urls {
        match source.fetch_html(url).await {
            Ok(html) => {
                any_ok = true;
                let found = extract_visible_stores(&html, selectors)?;
                tracing::debug!(%url, count = found.len(), "parsed store cards");
                records.extend(found);
            }
            Err(e) => {
                tracing::debug!(%url, error = %e, "store page failed to load");
                last_error = Some(e);
            }
        }
    }
    match last_error {
        Some(e) if !any_ok => Err(e),
        _ => Ok(records),
    }
}
