use std::collections::BTreeMap;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tradeprice_core::{Provenance, StoreLocation};
use tradeprice_scraper::{AggregateResult, RetailerError};

use crate::middleware::RequestId;

use super::{map_scraper_error, normalize_limit, ApiError, ApiResponse, AppState};

const DEFAULT_NEAREST: usize = 5;
const MAX_NEAREST: usize = 50;

#[derive(Debug, Default, Deserialize)]
pub(super) struct RefreshParams {
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct NearestParams {
    pub area: Option<String>,
    pub max: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(super) struct StoreList {
    pub count: usize,
    pub stores: Vec<StoreLocation>,
}

impl From<Vec<StoreLocation>> for StoreList {
    fn from(stores: Vec<StoreLocation>) -> Self {
        Self {
            count: stores.len(),
            stores,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct NearestStores {
    pub area: String,
    pub stores: Vec<StoreLocation>,
}

#[derive(Debug, Serialize)]
pub(super) struct RefreshResult {
    pub total: usize,
    pub successful_retailers: Vec<String>,
    pub errors: Vec<RetailerError>,
    pub duration_ms: u64,
    pub provenance: BTreeMap<String, Provenance>,
}

impl From<AggregateResult> for RefreshResult {
    fn from(result: AggregateResult) -> Self {
        Self {
            total: result.total,
            successful_retailers: result.successful_retailers,
            errors: result.errors,
            duration_ms: result.duration_ms,
            provenance: result.provenance,
        }
    }
}

pub(super) async fn list_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<RefreshParams>,
) -> Result<Json<ApiResponse<StoreList>>, ApiError> {
    let stores = state
        .service
        .fetch_all_stores(params.refresh)
        .await
        .map_err(|e| map_scraper_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(req_id.0, stores.into()))
}

pub(super) async fn retailer_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(retailer): Path<String>,
    Query(params): Query<RefreshParams>,
) -> Result<Json<ApiResponse<StoreList>>, ApiError> {
    let stores = state
        .service
        .fetch_stores(&retailer, params.refresh)
        .await
        .map_err(|e| map_scraper_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(req_id.0, stores.into()))
}

pub(super) async fn stores_by_region(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(region): Path<String>,
) -> Json<ApiResponse<StoreList>> {
    let stores = state.service.stores_by_region(&region).await;
    ApiResponse::new(req_id.0, stores.into())
}

pub(super) async fn nearest_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<NearestParams>,
) -> Result<Json<ApiResponse<NearestStores>>, ApiError> {
    let requested = params
        .area
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(state.areas.default_area());
    let Some(area) = state.areas.resolve(requested) else {
        return Err(ApiError::new(
            req_id.0,
            "bad_request",
            format!("unknown area '{requested}'"),
        ));
    };
    let area = area.name.clone();
    let max = normalize_limit(params.max, DEFAULT_NEAREST, MAX_NEAREST);

    let all = state.service.stores_for_ranking().await;
    let stores = state.areas.closest_store_locations(&area, &all, max);
    Ok(ApiResponse::new(req_id.0, NearestStores { area, stores }))
}

pub(super) async fn refresh_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<RefreshResult>>, ApiError> {
    tracing::info!(request_id = %req_id.0, "manual store refresh");
    let result = state
        .service
        .refresh_all_stores()
        .await
        .map_err(|e| map_scraper_error(req_id.0.clone(), &e))?;
    Ok(ApiResponse::new(req_id.0, result.into()))
}
