mod inventory;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use pantry_transact::{
    PartialProductSource, SessionManager, SessionStatus, SnapshotCache, TransactProvider,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{request_id, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub inventory: Arc<dyn PartialProductSource>,
    pub session: Arc<SessionManager>,
    pub cache: Arc<SnapshotCache>,
}

impl AppState {
    pub fn from_provider(provider: &Arc<TransactProvider>) -> Self {
        Self {
            inventory: Arc::clone(provider) as Arc<dyn PartialProductSource>,
            session: Arc::clone(provider.session()),
            cache: Arc::clone(provider.cache()),
        }
    }
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

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    session: SessionStatus,
    cache: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
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
            "not_initialized" => too_early(),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

/// 425: the inventory has not been fetched yet; retry later.
fn too_early() -> StatusCode {
    StatusCode::from_u16(425).unwrap_or(StatusCode::SERVICE_UNAVAILABLE)
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/inventory/locations",
            get(inventory::list_locations),
        )
        .route(
            "/api/v1/inventory/locations/{location}/products",
            get(inventory::list_products),
        )
        .route(
            "/api/v1/inventory/locations/{location}/products/{product_id}",
            get(inventory::get_product),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);
    let session = state.session.status();
    let loaded = state.cache.is_loaded();

    let (code, status) = if loaded && session != SessionStatus::NotReady {
        (StatusCode::OK, "ok")
    } else {
        tracing::warn!(
            cache_loaded = loaded,
            session = ?session,
            "health check: Transact sync degraded"
        );
        (StatusCode::SERVICE_UNAVAILABLE, "degraded")
    };

    (
        code,
        Json(ApiResponse {
            data: HealthData {
                status,
                session,
                cache: if loaded { "loaded" } else { "empty" },
            },
            meta,
        }),
    )
}
