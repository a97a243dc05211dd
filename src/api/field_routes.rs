//! REST API routes for the field catalog

use super::{ApiResult, AppState};
use crate::catalog::{Field, FieldId, SectionLayout};
use axum::{
    extract::{Path, Query, State},
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};

#[derive(Debug, Deserialize)]
pub struct CreateFieldRequest {
    pub name: String,
    #[serde(default, alias = "sectionCategory")]
    pub section_category: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameFieldRequest {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct FieldQuery {
    pub q: Option<String>,
}

/// GET /api/fields?q=
async fn list_fields(
    State(state): State<AppState>,
    Query(query): Query<FieldQuery>,
) -> ApiResult<Json<Vec<Field>>> {
    let catalog = state.coordinator.catalog();
    let fields = match query.q.as_deref() {
        Some(q) => catalog.search(q).await?,
        None => catalog.list().await?,
    };
    Ok(Json(fields))
}

/// POST /api/fields
async fn create_field(
    State(state): State<AppState>,
    Json(req): Json<CreateFieldRequest>,
) -> ApiResult<Json<Field>> {
    let field = state
        .coordinator
        .catalog()
        .create(&req.name, &req.section_category)
        .await?;
    Ok(Json(field))
}

/// PUT /api/fields/:id
async fn rename_field(
    State(state): State<AppState>,
    Path(id): Path<FieldId>,
    Json(req): Json<RenameFieldRequest>,
) -> ApiResult<Json<Field>> {
    Ok(Json(state.coordinator.catalog().rename(id, &req.name).await?))
}

/// DELETE /api/fields/:id
async fn delete_field(
    State(state): State<AppState>,
    Path(id): Path<FieldId>,
) -> ApiResult<Json<JsonValue>> {
    state.coordinator.catalog().delete(id).await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/fields/layout
async fn section_layout(State(state): State<AppState>) -> ApiResult<Json<SectionLayout>> {
    Ok(Json(state.coordinator.catalog().layout().await?))
}

pub fn field_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_fields).post(create_field))
        .route("/layout", get(section_layout))
        .route("/:id", put(rename_field).delete(delete_field))
}
