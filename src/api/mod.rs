//! REST API
//!
//! Thin axum layer over the workflow coordinator. Handlers translate requests
//! and map `KycError` onto status codes; no rule lives here.

use crate::error::KycError;
use crate::workflow::{SessionError, WorkflowCoordinator};
use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

pub mod field_routes;
pub mod profile_routes;
pub mod session_routes;

// ============================================================================
// State
// ============================================================================

/// Shared state for every route
#[derive(Clone)]
pub struct AppState {
    pub coordinator: WorkflowCoordinator,
}

impl AppState {
    pub fn new(coordinator: WorkflowCoordinator) -> Self {
        Self { coordinator }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// `KycError` as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub KycError);

impl From<KycError> for ApiError {
    fn from(err: KycError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self(KycError::not_found(entity, id))
    }

    fn status(&self) -> StatusCode {
        match &self.0 {
            KycError::Validation(_) => StatusCode::BAD_REQUEST,
            KycError::Conflict { .. } => StatusCode::CONFLICT,
            KycError::NotFound { .. } => StatusCode::NOT_FOUND,
            KycError::Session(SessionError::NotFound(_) | SessionError::Expired(_)) => {
                StatusCode::NOT_FOUND
            }
            KycError::Session(SessionError::InvalidStage { .. } | SessionError::Unsaved(_)) => {
                StatusCode::CONFLICT
            }
            KycError::Session(_) => StatusCode::BAD_REQUEST,
            KycError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            KycError::Validation(errors) => json!({
                "error": self.0.to_string(),
                "fieldErrors": errors,
            }),
            KycError::Storage(e) => {
                error!("Storage failure: {}", e);
                json!({ "error": "Internal Server Error" })
            }
            other => json!({ "error": other.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// Router
// ============================================================================

/// Full application router with CORS and request tracing
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/profiles", profile_routes::profile_router())
        .nest("/api/fields", field_routes::field_router())
        .nest("/api/sessions", session_routes::session_router())
        .fallback(unknown_route)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(state)
}

async fn unknown_route(uri: Uri) -> impl IntoResponse {
    let message = if uri.path().starts_with("/api") {
        "API route not found"
    } else {
        "Not found"
    };
    (StatusCode::NOT_FOUND, Json(json!({ "error": message })))
}
