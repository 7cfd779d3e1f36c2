//! Product price search.
//!
//! A retailer's search page is parsed for product cards, or for the product
//! JSON some sites embed instead. Candidates are scored against the query
//! and only the best few survive. When the live page gives nothing usable,
//! the retailer's recorded fallback prices go through the same scoring.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use tradeprice_core::matcher::{build_search_query, extract_price, parse_availability};
use tradeprice_core::retailers::ProductSelectors;
use tradeprice_core::{
    rank_candidates, MatchCandidate, MatchQuery, ProductPriceQuote, Provenance, RetailerConfig,
};
use url::Url;

use crate::error::ScraperError;
use crate::fallback::{FallbackProvider, FallbackQuote};
use crate::fetcher::{element_text, extract_balanced, parse_selector};
use crate::page::PageSource;

const PRODUCT_STATE_MARKERS: [&str; 2] = ["window.__INITIAL_STATE__", "window.productData"];

const MAX_NESTING: usize = 5;

/// A product parsed from a search page, before scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProduct {
    pub name: String,
    pub brand: Option<String>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub in_stock: bool,
    pub product_url: Option<String>,
    pub image_url: Option<String>,
}

impl MatchCandidate for RawProduct {
    fn match_name(&self) -> &str {
        &self.name
    }

    fn match_brand(&self) -> Option<&str> {
        self.brand.as_deref()
    }
}

impl From<&FallbackQuote> for RawProduct {
    fn from(q: &FallbackQuote) -> Self {
        Self {
            name: q.name.clone(),
            brand: q.brand.clone(),
            price: q.price,
            original_price: q.original_price,
            in_stock: q.in_stock,
            product_url: None,
            image_url: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriceOutcome {
    pub quotes: Vec<ProductPriceQuote>,
    pub provenance: Provenance,
}

pub struct PriceSearcher {
    source: Arc<dyn PageSource>,
    fallback: Arc<FallbackProvider>,
}

impl PriceSearcher {
    #[must_use]
    pub fn new(source: Arc<dyn PageSource>, fallback: Arc<FallbackProvider>) -> Self {
        Self { source, fallback }
    }

    /// Search one retailer for `query`. Never fails; falls back to recorded
    /// prices, which may themselves match nothing.
    pub async fn search(&self, retailer: &RetailerConfig, query: &MatchQuery) -> PriceOutcome {
        match self.search_live(retailer, query).await {
            Ok(quotes) if !quotes.is_empty() => {
                tracing::info!(
                    retailer = %retailer.id,
                    query = %query.name,
                    count = quotes.len(),
                    "fetched live prices"
                );
                PriceOutcome {
                    quotes,
                    provenance: Provenance::LiveFetch,
                }
            }
            Ok(_) => self.fall_back(retailer, query, "no matching products"),
            Err(e) => self.fall_back(retailer, query, &e.to_string()),
        }
    }

    async fn search_live(
        &self,
        retailer: &RetailerConfig,
        query: &MatchQuery,
    ) -> Result<Vec<ProductPriceQuote>, ScraperError> {
        if !self.source.automation_enabled() {
            return Err(ScraperError::AutomationUnavailable);
        }
        let search = build_search_query(query);
        let Some(url) = retailer.search_url_for(&search) else {
            return Ok(vec![]);
        };
        tracing::debug!(retailer = %retailer.id, %search, "searching retailer");
        let html = self.source.fetch_html(&url).await?;

        let mut products = match &retailer.product_selectors {
            Some(selectors) => parse_product_cards(&html, selectors, &retailer.base_url)?,
            None => vec![],
        };
        if products.is_empty() {
            products = parse_state_products(&html);
        }
        Ok(to_quotes(
            retailer,
            query,
            products,
            Provenance::LiveFetch,
            Utc::now(),
        ))
    }

    pub(crate) fn fall_back(
        &self,
        retailer: &RetailerConfig,
        query: &MatchQuery,
        reason: &str,
    ) -> PriceOutcome {
        let candidates: Vec<RawProduct> = self
            .fallback
            .quotes(&retailer.id)
            .iter()
            .map(RawProduct::from)
            .collect();
        let quotes = to_quotes(
            retailer,
            query,
            candidates,
            Provenance::FallbackLiteral,
            Utc::now(),
        );
        tracing::info!(
            retailer = %retailer.id,
            query = %query.name,
            reason,
            count = quotes.len(),
            "using fallback prices"
        );
        PriceOutcome {
            quotes,
            provenance: Provenance::FallbackLiteral,
        }
    }
}

/// Score, filter and truncate candidates, then build quotes.
#[must_use]
pub fn to_quotes(
    retailer: &RetailerConfig,
    query: &MatchQuery,
    candidates: Vec<RawProduct>,
    provenance: Provenance,
    now: DateTime<Utc>,
) -> Vec<ProductPriceQuote> {
    rank_candidates(query, candidates)
        .into_iter()
        .map(|(match_score, p)| ProductPriceQuote {
            retailer_id: retailer.id.clone(),
            retailer_name: retailer.display_name.clone(),
            on_sale: p.original_price.is_some_and(|o| o > p.price),
            product_name: p.name,
            brand: p.brand,
            price: p.price,
            original_price: p.original_price,
            currency: ProductPriceQuote::CURRENCY.to_string(),
            in_stock: p.in_stock,
            product_url: p.product_url,
            image_url: p.image_url,
            match_score,
            provenance,
            last_updated: now,
        })
        .collect()
}

fn first_text(card: ElementRef<'_>, selector: Option<&Selector>) -> Option<String> {
    card.select(selector?)
        .map(element_text)
        .find(|t| !t.is_empty())
}

fn first_attr(
    card: ElementRef<'_>,
    selector: Option<&Selector>,
    attrs: &[&str],
) -> Option<String> {
    card.select(selector?)
        .find_map(|el| attrs.iter().find_map(|a| el.value().attr(a)))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn optional_selector(selector: Option<&str>) -> Result<Option<Selector>, ScraperError> {
    selector.map(parse_selector).transpose()
}

fn absolute_url(base: &str, href: &str) -> Option<String> {
    Url::parse(base).and_then(|b| b.join(href)).ok().map(String::from)
}

/// Product cards on a search results page. Cards without a name or a
/// positive price are skipped.
///
/// # Errors
///
/// Returns [`ScraperError::Selector`] if a configured selector does not parse.
pub fn parse_product_cards(
    html: &str,
    selectors: &ProductSelectors,
    base_url: &str,
) -> Result<Vec<RawProduct>, ScraperError> {
    let container = parse_selector(&selectors.container)?;
    let name = parse_selector(&selectors.name)?;
    let price = parse_selector(&selectors.price)?;
    let original_price = optional_selector(selectors.original_price.as_deref())?;
    let brand = optional_selector(selectors.brand.as_deref())?;
    let availability = optional_selector(selectors.availability.as_deref())?;
    let product_url = optional_selector(selectors.product_url.as_deref())?;
    let image = optional_selector(selectors.image.as_deref())?;

    let document = Html::parse_document(html);
    let mut products = Vec::new();
    for card in document.select(&container) {
        let Some(product_name) = first_text(card, Some(&name)) else {
            continue;
        };
        let Some(amount) = first_text(card, Some(&price)).and_then(|t| extract_price(&t)) else {
            continue;
        };
        products.push(RawProduct {
            name: product_name,
            brand: first_text(card, brand.as_ref()),
            price: amount,
            original_price: first_text(card, original_price.as_ref())
                .and_then(|t| extract_price(&t)),
            in_stock: parse_availability(first_text(card, availability.as_ref()).as_deref()),
            product_url: first_attr(card, product_url.as_ref(), &["href"])
                .and_then(|href| absolute_url(base_url, &href)),
            image_url: first_attr(card, image.as_ref(), &["src", "data-src"]),
        });
    }
    Ok(products)
}

/// Products from a `window.__INITIAL_STATE__` or `window.productData`
/// assignment, for sites that render results client-side.
#[must_use]
pub fn parse_state_products(html: &str) -> Vec<RawProduct> {
    for marker in PRODUCT_STATE_MARKERS {
        for (pos, _) in html.match_indices(marker) {
            let rest = html[pos + marker.len()..]
                .trim_start_matches(|c: char| c.is_whitespace() || c == '=');
            let Some(value) = extract_balanced(rest)
                .and_then(|json| serde_json::from_str::<Value>(json).ok())
            else {
                continue;
            };
            let products: Vec<RawProduct> = find_product_array(&value, 0)
                .map(|items| items.iter().filter_map(product_from_json).collect())
                .unwrap_or_default();
            if !products.is_empty() {
                tracing::debug!(marker, count = products.len(), "found embedded product data");
                return products;
            }
        }
    }
    vec![]
}

fn field<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

fn field_text(obj: &Value, keys: &[&str]) -> Option<String> {
    match field(obj, keys)? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn looks_like_products(items: &[Value]) -> bool {
    items.first().is_some_and(|first| {
        field(first, &["name", "title"]).is_some()
            && field(first, &["price", "currentPrice"]).is_some()
    })
}

fn find_product_array(value: &Value, depth: usize) -> Option<&Vec<Value>> {
    match value {
        Value::Array(items) if looks_like_products(items) => Some(items),
        Value::Object(map) if depth < MAX_NESTING => map
            .values()
            .find_map(|inner| find_product_array(inner, depth + 1)),
        _ => None,
    }
}

fn product_from_json(obj: &Value) -> Option<RawProduct> {
    let name = field_text(obj, &["name", "title"])?;
    let price = field_text(obj, &["price", "currentPrice"]).and_then(|t| extract_price(&t))?;
    let in_stock = match field(obj, &["availability", "stock", "inStock"]) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v > 0.0),
        Some(Value::String(s)) => parse_availability(Some(s.as_str())),
        _ => true,
    };
    Some(RawProduct {
        name,
        brand: field_text(obj, &["brand", "manufacturer"]),
        price,
        original_price: field_text(obj, &["wasPrice", "originalPrice"])
            .and_then(|t| extract_price(&t)),
        in_stock,
        product_url: field_text(obj, &["url", "productUrl"]),
        image_url: field_text(obj, &["image", "imageUrl"]),
    })
}

#[cfg(test)]
#[path = "prices_test.rs"]
mod tests;
