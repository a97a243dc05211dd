//! REST API routes for workflow sessions
//!
//! A client holds only the session id between the Maker, Checker and Reporter
//! screens; the state itself stays server-side.

use super::{ApiResult, AppState};
use crate::catalog::SectionLayout;
use crate::report::{ProfileReport, VerificationSummary};
use crate::store::ProfileId;
use crate::workflow::WorkflowSession;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use uuid::Uuid;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartSessionRequest {
    /// Explicit layout; the catalog's when absent
    #[serde(default)]
    pub layout: Option<SectionLayout>,
}

#[derive(Debug, Deserialize)]
pub struct SetFieldRequest {
    pub section: String,
    pub field: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectSectionRequest {
    pub section: String,
}

#[derive(Debug, Deserialize)]
pub struct SetVerifiedRequest {
    pub section: String,
    pub field: String,
    /// Omitted to toggle
    #[serde(default)]
    pub verified: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub section: Option<String>,
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST /api/sessions
async fn start_session(
    State(state): State<AppState>,
    body: Option<Json<StartSessionRequest>>,
) -> ApiResult<(StatusCode, Json<WorkflowSession>)> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let session = state.coordinator.start_session(req.layout).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/sessions/from-profile/:profile_id
async fn open_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<ProfileId>,
) -> ApiResult<(StatusCode, Json<WorkflowSession>)> {
    let session = state.coordinator.open_profile(profile_id).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// GET /api/sessions/:id
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowSession>> {
    Ok(Json(state.coordinator.session(id).await?))
}

/// DELETE /api/sessions/:id
async fn discard_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.coordinator.discard(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/sessions/:id/fields
async fn set_field(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetFieldRequest>,
) -> ApiResult<Json<WorkflowSession>> {
    let session = state
        .coordinator
        .set_field(id, &req.section, &req.field, &req.value)
        .await?;
    Ok(Json(session))
}

/// PUT /api/sessions/:id/section
async fn select_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectSectionRequest>,
) -> ApiResult<Json<WorkflowSession>> {
    Ok(Json(state.coordinator.select_section(id, &req.section).await?))
}

/// POST /api/sessions/:id/save
async fn save_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowSession>> {
    Ok(Json(state.coordinator.save_section(id).await?))
}

/// POST /api/sessions/:id/next
async fn next_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowSession>> {
    Ok(Json(state.coordinator.next_section(id).await?))
}

/// POST /api/sessions/:id/previous
async fn previous_section(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowSession>> {
    Ok(Json(state.coordinator.previous_section(id).await?))
}

/// POST /api/sessions/:id/submit
async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowSession>> {
    Ok(Json(state.coordinator.submit(id).await?))
}

/// PUT /api/sessions/:id/verified
async fn set_verified(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<SetVerifiedRequest>,
) -> ApiResult<Json<WorkflowSession>> {
    let session = match req.verified {
        Some(verified) => {
            state
                .coordinator
                .set_verified(id, &req.section, &req.field, verified)
                .await?
        }
        None => {
            state
                .coordinator
                .toggle_verified(id, &req.section, &req.field)
                .await?
        }
    };
    Ok(Json(session))
}

/// GET /api/sessions/:id/summary
async fn summary(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<VerificationSummary>> {
    Ok(Json(state.coordinator.summary(id).await?))
}

/// POST /api/sessions/:id/verification
async fn submit_verification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<WorkflowSession>> {
    Ok(Json(state.coordinator.submit_verification(id).await?))
}

/// POST /api/sessions/:id/edit
async fn edit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<EditRequest>>,
) -> ApiResult<Json<WorkflowSession>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    Ok(Json(state.coordinator.edit(id, req.section.as_deref()).await?))
}

/// GET /api/sessions/:id/report
async fn report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<ProfileReport>>> {
    Ok(Json(state.coordinator.report(id).await?))
}

// ============================================================================
// Router
// ============================================================================

pub fn session_router() -> Router<AppState> {
    Router::new()
        .route("/", post(start_session))
        .route("/from-profile/:profile_id", post(open_profile))
        .route("/:id", get(get_session).delete(discard_session))
        .route("/:id/fields", put(set_field))
        .route("/:id/section", put(select_section))
        .route("/:id/save", post(save_section))
        .route("/:id/next", post(next_section))
        .route("/:id/previous", post(previous_section))
        .route("/:id/submit", post(submit))
        .route("/:id/verified", put(set_verified))
        .route("/:id/summary", get(summary))
        .route("/:id/verification", post(submit_verification))
        .route("/:id/edit", post(edit))
        .route("/:id/report", get(report))
}
