use axum::{
    extract::{Query, State},
    Extension, Json,
};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct SuggestParams {
    pub q: Option<String>,
    pub limit: Option<usize>,
}

pub(super) async fn suggest_areas(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(params): Query<SuggestParams>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let Some(partial) = params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) else {
        return Err(ApiError::new(req_id.0, "bad_request", "q is required"));
    };
    let limit = normalize_limit(params.limit, 10, 50);
    let names = state
        .areas
        .location_suggestions(partial, limit)
        .into_iter()
        .map(str::to_string)
        .collect();
    Ok(ApiResponse::new(req_id.0, names))
}
