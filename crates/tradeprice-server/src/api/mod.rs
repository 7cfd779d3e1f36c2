mod areas;
mod prices;
mod products;
mod stores;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tradeprice_core::AreaTable;
use tradeprice_scraper::{CacheStatus, PriceService, ScraperError};

use crate::middleware::{enforce_rate_limit, request_id, RateLimitState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PriceService>,
    pub areas: Arc<AreaTable>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(super) fn new(request_id: String, data: T) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "bad_request" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_scraper_error(request_id: String, error: &ScraperError) -> ApiError {
    match error {
        ScraperError::UnknownRetailer(id) => {
            ApiError::new(request_id, "not_found", format!("unknown retailer: {id}"))
        }
        ScraperError::RefreshInProgress(_) => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        other => {
            tracing::error!(error = %other, "request failed");
            ApiError::new(request_id, "internal_error", "request failed")
        }
    }
}

/// Clamp an optional `limit`/`max` query value.
pub(super) fn normalize_limit(limit: Option<usize>, default: usize, max: usize) -> usize {
    limit.unwrap_or(default).clamp(1, max)
}

/// Comma-separated ids, trimmed. `None` when nothing usable remains.
pub(super) fn split_ids(raw: Option<&str>) -> Option<Vec<String>> {
    let ids: Vec<String> = raw?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
        .collect();
    (!ids.is_empty()).then_some(ids)
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static("x-request-id")])
}

fn api_router(rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/stores", get(stores::list_stores))
        .route("/api/stores/refresh", post(stores::refresh_stores))
        .route("/api/stores/nearest", get(stores::nearest_stores))
        .route("/api/stores/region/{region}", get(stores::stores_by_region))
        .route("/api/stores/{retailer}", get(stores::retailer_stores))
        .route("/api/prices", get(prices::get_prices))
        .route("/api/prices/refresh", post(prices::refresh_prices))
        .route("/api/products", get(products::list_products))
        .route("/api/products/search", get(products::search_products))
        .route("/api/products/refresh", post(products::refresh_products))
        .route("/api/status", get(status))
        .route("/api/areas/suggest", get(areas::suggest_areas))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ))
}

pub fn build_app(state: AppState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(api_router(rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    retailers: usize,
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    ApiResponse::new(
        req_id.0,
        HealthData {
            status: "ok",
            retailers: state.service.retailers().retailers.len(),
        },
    )
}

#[derive(Debug, Serialize)]
struct StatusData {
    cache: CacheStatus,
    refreshing: Vec<String>,
    recent_queries: usize,
}

async fn status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Json<ApiResponse<StatusData>> {
    ApiResponse::new(
        req_id.0,
        StatusData {
            cache: state.service.cache_status(),
            refreshing: state.service.refreshing(),
            recent_queries: state.service.recent_queries().len(),
        },
    )
}

/// State backed by the embedded tables with page automation switched off,
/// so every fetch resolves to fallback data without network access.
#[cfg(test)]
pub(crate) fn offline_state() -> AppState {
    use tradeprice_core::{CategoryTable, RetailersFile};
    use tradeprice_scraper::{FallbackProvider, HttpPageSource, ServiceOptions};

    let source = HttpPageSource::new(5, 5, "tradeprice-test", false).expect("client");
    let service = PriceService::new(
        Arc::new(RetailersFile::embedded().expect("retailers")),
        Arc::new(CategoryTable::embedded().expect("categories")),
        Arc::new(source),
        Arc::new(FallbackProvider::embedded().expect("fixtures")),
        ServiceOptions::default(),
    );
    AppState {
        service: Arc::new(service),
        areas: Arc::new(AreaTable::embedded().expect("areas")),
    }
}
