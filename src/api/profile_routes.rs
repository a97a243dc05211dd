//! REST API routes for KYC profiles

use super::{ApiError, ApiResult, AppState};
use crate::report::ProfileReport;
use crate::sections::{ProfileDetails, VerificationMap};
use crate::store::{Profile, ProfileId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DetailsRequest {
    pub details: ProfileDetails,
}

#[derive(Debug, Deserialize)]
pub struct VerifyRequest {
    pub verified: VerificationMap,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /api/profiles
async fn create_profile(
    State(state): State<AppState>,
    Json(req): Json<DetailsRequest>,
) -> ApiResult<(StatusCode, Json<Profile>)> {
    let profile = state
        .coordinator
        .profiles()
        .create_profile(&req.details)
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// PUT /api/profiles/:id
async fn update_profile(
    State(state): State<AppState>,
    Path(id): Path<ProfileId>,
    Json(req): Json<DetailsRequest>,
) -> ApiResult<Json<Profile>> {
    let profile = state
        .coordinator
        .profiles()
        .update_profile(id, &req.details)
        .await?;
    Ok(Json(profile))
}

/// PUT /api/profiles/:id/verify
/// Replaces the stored verification map
async fn record_verification(
    State(state): State<AppState>,
    Path(id): Path<ProfileId>,
    Json(req): Json<VerifyRequest>,
) -> ApiResult<Json<Profile>> {
    let profile = state
        .coordinator
        .profiles()
        .record_verification(id, &req.verified)
        .await?;
    Ok(Json(profile))
}

/// GET /api/profiles/:id
async fn get_profile(
    State(state): State<AppState>,
    Path(id): Path<ProfileId>,
) -> ApiResult<Json<Profile>> {
    state
        .coordinator
        .profiles()
        .fetch_by_id(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("profile", id))
}

/// GET /api/profiles/by-pan/:pan
async fn profiles_by_pan(
    State(state): State<AppState>,
    Path(pan): Path<String>,
) -> ApiResult<Json<Vec<Profile>>> {
    Ok(Json(state.coordinator.profiles().fetch_by_pan(&pan).await?))
}

/// GET /api/profiles/by-pan/:pan/report
async fn report_by_pan(
    State(state): State<AppState>,
    Path(pan): Path<String>,
) -> ApiResult<Json<Vec<ProfileReport>>> {
    Ok(Json(state.coordinator.report_by_pan(&pan).await?))
}

// ============================================================================
// Router
// ============================================================================

pub fn profile_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_profile))
        .route("/:id", get(get_profile).put(update_profile))
        .route("/:id/verify", put(record_verification))
        .route("/by-pan/:pan", get(profiles_by_pan))
        .route("/by-pan/:pan/report", get(report_by_pan))
}
