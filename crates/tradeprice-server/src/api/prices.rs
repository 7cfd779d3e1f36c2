use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tradeprice_core::{MatchQuery, ProductPriceQuote};

use crate::middleware::RequestId;

use super::{map_scraper_error, split_ids, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct PriceParams {
    pub product: Option<String>,
    pub brand: Option<String>,
    /// Comma-separated retailer ids; all retailers when absent.
    pub retailers: Option<String>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct PriceComparison {
    pub query: MatchQuery,
    pub count: usize,
    pub quotes: Vec<ProductPriceQuote>,
}

impl PriceParams {
    fn query(&self, req_id: &str) -> Result<MatchQuery, ApiError> {
        let product = self
            .product
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ApiError::new(req_id, "bad_request", "product is required"))?;
        let brand = self
            .brand
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty());
        Ok(MatchQuery::new(product, brand))
    }

    fn retailer_ids(&self) -> Option<Vec<String>> {
        split_ids(self.retailers.as_deref())
    }
}

async fn compare(
    state: &AppState,
    req_id: String,
    params: &PriceParams,
    force: bool,
) -> Result<Json<ApiResponse<PriceComparison>>, ApiError> {
    let query = params.query(&req_id)?;
    let retailers = params.retailer_ids();
    let quotes = state
        .service
        .fetch_prices(&query, retailers.as_deref(), force)
        .await
        .map_err(|e| map_scraper_error(req_id.clone(), &e))?;
    Ok(ApiResponse::new(
        req_id,
        PriceComparison {
            count: quotes.len(),
            query,
            quotes,
        },
    ))
}

pub(super) async fn get_prices(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<PriceParams>,
) -> Result<Json<ApiResponse<PriceComparison>>, ApiError> {
    compare(&state, req_id.0, &params, params.refresh).await
}

pub(super) async fn refresh_prices(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<PriceParams>,
) -> Result<Json<ApiResponse<PriceComparison>>, ApiError> {
    tracing::info!(request_id = %req_id.0, product = ?params.product, "manual price refresh");
    compare(&state, req_id.0, &params, true).await
}
