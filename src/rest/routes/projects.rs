// rest/routes/projects.rs — Project, column, card, and dependency routes.
//
// Each handler loads the aggregate (full replay), invokes one command, and
// returns the resulting projection fragment.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::error_response;
use super::workspaces::HistoryQuery;
use crate::board::events::StreamType;
use crate::board::{BoardError, ProjectAggregate};
use crate::AppContext;

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

async fn load<'a>(
    ctx: &'a AppContext,
    project_id: &str,
) -> Result<ProjectAggregate<'a>, (StatusCode, Json<Value>)> {
    ProjectAggregate::load(&ctx.store, project_id)
        .await
        .map_err(error_response)
}

// ── Projects ─────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

pub async fn create_project(
    State(ctx): State<Arc<AppContext>>,
    Path(workspace_id): Path<String>,
    Json(body): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let project = ProjectAggregate::create(&ctx.store, &workspace_id, &body.name, &body.description)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(json!(project.to_project()))))
}

pub async fn get_project(State(ctx): State<Arc<AppContext>>, Path(id): Path<String>) -> ApiResult {
    let project = load(&ctx, &id).await?;
    // Soft-deleted projects read as gone; their history stays queryable.
    if project.is_deleted() {
        return Err(error_response(BoardError::not_found("project", id)));
    }
    Ok(Json(json!(project.to_project())))
}

#[derive(Deserialize)]
pub struct UpdateProjectRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

pub async fn update_project(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateProjectRequest>,
) -> ApiResult {
    let mut project = load(&ctx, &id).await?;
    if let Some(name) = &body.name {
        project.rename(name).await.map_err(error_response)?;
    }
    if let Some(description) = &body.description {
        project
            .update_description(description)
            .await
            .map_err(error_response)?;
    }
    Ok(Json(json!(project.to_project())))
}

pub async fn delete_project(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> ApiResult {
    let mut project = load(&ctx, &id).await?;
    project.delete().await.map_err(error_response)?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn project_events(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> ApiResult {
    let events = ctx
        .store
        .events(StreamType::Project, &id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "events": events })))
}

// ── Columns ──────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AddColumnRequest {
    pub name: String,
    pub position: Option<i64>,
}

pub async fn add_column(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<AddColumnRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let mut project = load(&ctx, &id).await?;
    let column = project
        .add_column(&body.name, body.position)
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(json!(column))))
}

pub async fn get_column(
    State(ctx): State<Arc<AppContext>>,
    Path((id, column_id)): Path<(String, String)>,
) -> ApiResult {
    let project = load(&ctx, &id).await?;
    let column = project.get_column(&column_id).map_err(error_response)?;
    Ok(Json(json!(column)))
}

#[derive(Deserialize)]
pub struct UpdateColumnRequest {
    pub name: Option<String>,
    pub position: Option<i64>,
}

pub async fn update_column(
    State(ctx): State<Arc<AppContext>>,
    Path((id, column_id)): Path<(String, String)>,
    Json(body): Json<UpdateColumnRequest>,
) -> ApiResult {
    let mut project = load(&ctx, &id).await?;
    if let Some(name) = &body.name {
        project
            .rename_column(&column_id, name)
            .await
            .map_err(error_response)?;
    }
    if let Some(position) = body.position {
        project
            .move_column(&column_id, position)
            .await
            .map_err(error_response)?;
    }
    let column = project.get_column(&column_id).map_err(error_response)?;
    Ok(Json(json!(column)))
}

pub async fn delete_column(
    State(ctx): State<Arc<AppContext>>,
    Path((id, column_id)): Path<(String, String)>,
) -> ApiResult {
    let mut project = load(&ctx, &id).await?;
    project
        .delete_column(&column_id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "deleted": true })))
}

// ── Cards ────────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AddCardRequest {
    pub column_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub position: Option<i64>,
    #[serde(rename = "_source")]
    pub source: Option<String>,
}

pub async fn add_card(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Json(body): Json<AddCardRequest>,
) -> Result<(StatusCode, Json<Value>), (StatusCode, Json<Value>)> {
    let mut project = load(&ctx, &id).await?;
    let card = project
        .add_card(
            &body.column_id,
            &body.title,
            &body.description,
            body.position,
            body.source,
        )
        .await
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(json!(card))))
}

pub async fn get_card(
    State(ctx): State<Arc<AppContext>>,
    Path((id, card_id)): Path<(String, String)>,
) -> ApiResult {
    let project = load(&ctx, &id).await?;
    let card = project.get_card(&card_id).map_err(error_response)?;
    Ok(Json(json!(card)))
}

#[derive(Deserialize)]
pub struct UpdateCardRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "_source")]
    pub source: Option<String>,
}

pub async fn update_card(
    State(ctx): State<Arc<AppContext>>,
    Path((id, card_id)): Path<(String, String)>,
    Json(body): Json<UpdateCardRequest>,
) -> ApiResult {
    let mut project = load(&ctx, &id).await?;
    let card = project
        .update_card(&card_id, body.title, body.description, body.source)
        .await
        .map_err(error_response)?;
    Ok(Json(json!(card)))
}

#[derive(Deserialize)]
pub struct MoveCardRequest {
    pub column_id: String,
    pub position: Option<i64>,
    #[serde(rename = "_source")]
    pub source: Option<String>,
}

pub async fn move_card(
    State(ctx): State<Arc<AppContext>>,
    Path((id, card_id)): Path<(String, String)>,
    Json(body): Json<MoveCardRequest>,
) -> ApiResult {
    let mut project = load(&ctx, &id).await?;
    let card = project
        .move_card(&card_id, &body.column_id, body.position, body.source)
        .await
        .map_err(error_response)?;
    Ok(Json(json!(card)))
}

/// Optional audit tag for DELETE requests, which may arrive without a body.
#[derive(Deserialize)]
pub struct SourceTagRequest {
    #[serde(rename = "_source")]
    pub source: Option<String>,
}

pub async fn delete_card(
    State(ctx): State<Arc<AppContext>>,
    Path((id, card_id)): Path<(String, String)>,
    body: Option<Json<SourceTagRequest>>,
) -> ApiResult {
    let source = body.and_then(|Json(b)| b.source);
    let mut project = load(&ctx, &id).await?;
    project
        .delete_card(&card_id, source)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "deleted": true })))
}

pub async fn card_events(
    State(ctx): State<Arc<AppContext>>,
    Path((id, card_id)): Path<(String, String)>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult {
    let events = ctx
        .store
        .card_events(&id, &card_id, query.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "events": events })))
}

// ── Dependencies ─────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AddDependencyRequest {
    pub depends_on_id: String,
    #[serde(rename = "_source")]
    pub source: Option<String>,
}

pub async fn add_dependency(
    State(ctx): State<Arc<AppContext>>,
    Path((id, card_id)): Path<(String, String)>,
    Json(body): Json<AddDependencyRequest>,
) -> ApiResult {
    let mut project = load(&ctx, &id).await?;
    let card = project
        .add_dependency(&card_id, &body.depends_on_id, body.source)
        .await
        .map_err(error_response)?;
    Ok(Json(json!(card)))
}

pub async fn remove_dependency(
    State(ctx): State<Arc<AppContext>>,
    Path((id, card_id, depends_on_id)): Path<(String, String, String)>,
    body: Option<Json<SourceTagRequest>>,
) -> ApiResult {
    let source = body.and_then(|Json(b)| b.source);
    let mut project = load(&ctx, &id).await?;
    let card = project
        .remove_dependency(&card_id, &depends_on_id, source)
        .await
        .map_err(error_response)?;
    Ok(Json(json!(card)))
}
