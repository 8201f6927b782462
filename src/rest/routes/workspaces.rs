// rest/routes/workspaces.rs — Workspace REST routes.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

use super::error_response;
use crate::board::WorkspaceAggregate;
use crate::AppContext;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

/// Get-or-create: workspaces come into existence on first access.
pub async fn get_workspace(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let state = WorkspaceAggregate::new(&ctx.store)
        .ensure(&id)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({
        "id": state.id,
        "created_at": state.created_at,
    })))
}

/// Workspace stream merged with its projects' streams, timestamp order.
pub async fn workspace_events(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let events = ctx
        .store
        .workspace_events(&id, query.limit)
        .await
        .map_err(error_response)?;
    Ok(Json(json!({ "events": events })))
}
