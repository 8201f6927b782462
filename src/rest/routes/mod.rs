pub mod health;
pub mod projects;
pub mod workspaces;

use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

use crate::board::BoardError;

/// Map a board failure to its transport status.
pub fn error_response(err: BoardError) -> (StatusCode, Json<Value>) {
    let status = match &err {
        BoardError::NotFound { .. } => StatusCode::NOT_FOUND,
        BoardError::InvalidOperation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BoardError::Conflict { .. } => StatusCode::CONFLICT,
        BoardError::Storage(_) | BoardError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "error": err.to_string() })))
}
