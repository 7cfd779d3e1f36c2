//! Command handlers. Each returns the JSON document `main` prints.

use anyhow::Context;
use serde_json::{json, Value};
use tradeprice_core::{distance_km, filter_products, AreaTable, Coordinate, MatchQuery, Product};
use tradeprice_scraper::PriceService;

fn service() -> anyhow::Result<PriceService> {
    let config = tradeprice_core::load_app_config()?;
    PriceService::from_config(&config).context("failed to build price service")
}

/// Run a store refresh for one retailer or all of them.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or `retailer` is not
/// a configured retailer id.
pub(crate) async fn refresh_stores(retailer: Option<&str>) -> anyhow::Result<Value> {
    let service = service()?;
    match retailer {
        Some(id) => {
            let stores = service.fetch_stores(id, true).await?;
            tracing::info!(retailer = id, count = stores.len(), "stores refreshed");
            Ok(json!({ "retailer": id, "count": stores.len(), "stores": stores }))
        }
        None => {
            let result = service.refresh_all_stores().await?;
            tracing::info!(
                total = result.total,
                failed = result.errors.len(),
                duration_ms = result.duration_ms,
                "all stores refreshed"
            );
            Ok(serde_json::to_value(result)?)
        }
    }
}

/// # Errors
///
/// Returns an error if configuration cannot be loaded or any of
/// `retailers` is unknown.
pub(crate) async fn compare_prices(
    product: &str,
    brand: Option<&str>,
    retailers: &[String],
) -> anyhow::Result<Value> {
    let service = service()?;
    let query = MatchQuery::new(product.trim(), brand);
    let filter = (!retailers.is_empty()).then_some(retailers);
    let quotes = service.fetch_prices(&query, filter, false).await?;
    tracing::info!(product = %query.name, count = quotes.len(), "prices compared");
    Ok(json!({ "query": query, "count": quotes.len(), "quotes": quotes }))
}

/// Catalog entries in `category` whose text matches `search`, at most
/// `limit` of them.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded.
pub(crate) async fn list_products(
    category: Option<&str>,
    search: Option<&str>,
    limit: usize,
    refresh: bool,
) -> anyhow::Result<Value> {
    let service = service()?;
    let products = service.fetch_products(category, refresh).await?;
    tracing::info!(category = category.unwrap_or("all"), count = products.len(), "catalog loaded");
    Ok(product_listing(&products, search, limit))
}

pub(crate) fn product_listing(products: &[Product], search: Option<&str>, limit: usize) -> Value {
    let mut matched = filter_products(products, None, search);
    let total = matched.len();
    matched.truncate(limit);
    json!({ "total": total, "count": matched.len(), "products": matched })
}

/// # Errors
///
/// Returns an error if configuration cannot be loaded or any of
/// `retailers` is unknown.
pub(crate) async fn search_products(term: &str, retailers: &[String]) -> anyhow::Result<Value> {
    let service = service()?;
    let filter = (!retailers.is_empty()).then_some(retailers);
    let products = service.search_products(term, filter).await?;
    tracing::info!(term, count = products.len(), "products searched");
    Ok(json!({ "query": term.trim(), "count": products.len(), "products": products }))
}

/// # Errors
///
/// Returns an error if the embedded area table fails to load.
pub(crate) fn closest_area(lat: f64, lng: f64) -> anyhow::Result<Value> {
    let areas = AreaTable::embedded()?;
    let area = areas.find_closest_area(Coordinate::new(lat, lng));
    Ok(json!({ "lat": lat, "lng": lng, "area": area }))
}

/// # Errors
///
/// Returns an error if the embedded area table fails to load.
pub(crate) fn suggest_areas(partial: &str, limit: usize) -> anyhow::Result<Value> {
    let areas = AreaTable::embedded()?;
    Ok(json!({
        "query": partial,
        "suggestions": areas.location_suggestions(partial, limit),
    }))
}

pub(crate) fn distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> Value {
    let km = distance_km(Coordinate::new(lat1, lng1), Coordinate::new(lat2, lng2));
    json!({
        "from": { "lat": lat1, "lng": lng1 },
        "to": { "lat": lat2, "lng": lng2 },
        "distance_km": (km * 100.0).round() / 100.0,
    })
}
