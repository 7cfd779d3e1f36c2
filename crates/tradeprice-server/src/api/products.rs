use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tradeprice_core::{filter_products, Product, Provenance};
use tradeprice_scraper::{CatalogRefresh, RetailerError};

use crate::middleware::RequestId;

use super::{map_scraper_error, normalize_limit, split_ids, ApiError, ApiResponse, AppState};

const DEFAULT_PRODUCTS: usize = 50;
const MAX_PRODUCTS: usize = 500;

#[derive(Debug, Deserialize)]
pub(super) struct ProductListParams {
    pub category: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductSearchParams {
    pub q: Option<String>,
    /// Comma-separated retailer ids; all retailers when absent.
    pub retailers: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductList {
    /// Matches before `limit` was applied.
    pub total: usize,
    pub count: usize,
    pub categories: Vec<String>,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub(super) struct ProductSearch {
    pub query: String,
    pub count: usize,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
pub(super) struct CatalogRefreshResult {
    pub total: usize,
    pub errors: Vec<RetailerError>,
    pub duration_ms: u64,
    pub provenance: Provenance,
}

impl From<CatalogRefresh> for CatalogRefreshResult {
    fn from(refresh: CatalogRefresh) -> Self {
        Self {
            total: refresh.total,
            errors: refresh.errors,
            duration_ms: refresh.duration_ms,
            provenance: refresh.provenance,
        }
    }
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ProductListParams>,
) -> Result<Json<ApiResponse<ProductList>>, ApiError> {
    let products = state
        .service
        .fetch_products(params.category.as_deref(), params.refresh)
        .await
        .map_err(|e| map_scraper_error(req_id.0.clone(), &e))?;
    let mut products = filter_products(&products, None, params.search.as_deref());
    let total = products.len();
    products.truncate(normalize_limit(params.limit, DEFAULT_PRODUCTS, MAX_PRODUCTS));
    Ok(ApiResponse::new(
        req_id.0,
        ProductList {
            total,
            count: products.len(),
            categories: state
                .service
                .category_ids()
                .into_iter()
                .map(ToOwned::to_owned)
                .collect(),
            products,
        },
    ))
}

pub(super) async fn search_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<ProductSearchParams>,
) -> Result<Json<ApiResponse<ProductSearch>>, ApiError> {
    let Some(term) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
        return Err(ApiError::new(req_id.0, "bad_request", "q is required"));
    };
    let retailers = split_ids(params.retailers.as_deref());
    let products = state
        .service
        .search_products(term, retailers.as_deref())
        .await
        .map_err(|e| map_scraper_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(
        req_id.0,
        ProductSearch {
            query: term.to_string(),
            count: products.len(),
            products,
        },
    ))
}

pub(super) async fn refresh_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<CatalogRefreshResult>>, ApiError> {
    tracing::info!(request_id = %req_id.0, "manual catalog refresh");
    let refresh = state
        .service
        .refresh_products()
        .await
        .map_err(|e| map_scraper_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(req_id.0, refresh.into()))
}
