use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use pantry_transact::{CacheError, PartialProduct};
use serde::Deserialize;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    /// Case-insensitive substring of the product name.
    pub search: Option<String>,
}

fn map_cache_error(request_id: String, error: &CacheError) -> ApiError {
    let code = match error {
        CacheError::NotInitialized { .. } => "not_initialized",
        CacheError::LocationNotFound { .. } | CacheError::ProductNotFound { .. } => "not_found",
    };
    ApiError::new(request_id, code, error.to_string())
}

pub(super) async fn list_locations(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<String>>>, ApiError> {
    let data = state
        .inventory
        .list_locations()
        .map_err(|e| map_cache_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(location): Path<String>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<PartialProduct>>>, ApiError> {
    let mut data = state
        .inventory
        .list_products(&location)
        .map_err(|e| map_cache_error(req_id.0.clone(), &e))?;

    if let Some(search) = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        let needle = search.to_lowercase();
        data.retain(|p| p.name.to_lowercase().contains(&needle));
    }

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path((location, product_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<PartialProduct>>, ApiError> {
    let data = state
        .inventory
        .get_product(&location, &product_id)
        .map_err(|e| map_cache_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
