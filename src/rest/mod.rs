// rest/mod.rs — Public REST API server.
//
// Axum HTTP server bridging REST calls to the board aggregates. Handlers are
// thin parameter marshaling; every rule lives in the aggregates.
//
// Endpoints:
//   GET    /api/v1/health
//   GET    /api/v1/workspaces/{id}                       (get-or-create)
//   GET    /api/v1/workspaces/{id}/events
//   POST   /api/v1/workspaces/{id}/projects
//   GET    /api/v1/projects/{id}
//   PATCH  /api/v1/projects/{id}
//   DELETE /api/v1/projects/{id}
//   GET    /api/v1/projects/{id}/events
//   GET    /api/v1/projects/{id}/live                    (SSE)
//   POST   /api/v1/projects/{id}/columns
//   GET    /api/v1/projects/{id}/columns/{column_id}
//   PATCH  /api/v1/projects/{id}/columns/{column_id}
//   DELETE /api/v1/projects/{id}/columns/{column_id}
//   POST   /api/v1/projects/{id}/cards
//   GET    /api/v1/projects/{id}/cards/{card_id}
//   PATCH  /api/v1/projects/{id}/cards/{card_id}
//   DELETE /api/v1/projects/{id}/cards/{card_id}
//   POST   /api/v1/projects/{id}/cards/{card_id}/move
//   GET    /api/v1/projects/{id}/cards/{card_id}/events
//   POST   /api/v1/projects/{id}/cards/{card_id}/dependencies
//   DELETE /api/v1/projects/{id}/cards/{card_id}/dependencies/{depends_on_id}

pub mod routes;
pub mod sse;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::AppContext;

pub async fn start_rest_server(ctx: Arc<AppContext>) -> Result<()> {
    let bind = format!("{}:{}", ctx.config.bind_address, ctx.config.port);
    let addr: SocketAddr = bind.parse()?;

    let router = build_router(ctx);

    info!("REST API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

pub fn build_router(ctx: Arc<AppContext>) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health))
        // Workspaces
        .route(
            "/api/v1/workspaces/{id}",
            get(routes::workspaces::get_workspace),
        )
        .route(
            "/api/v1/workspaces/{id}/events",
            get(routes::workspaces::workspace_events),
        )
        .route(
            "/api/v1/workspaces/{id}/projects",
            post(routes::projects::create_project),
        )
        // Projects
        .route(
            "/api/v1/projects/{id}",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route(
            "/api/v1/projects/{id}/events",
            get(routes::projects::project_events),
        )
        .route("/api/v1/projects/{id}/live", get(sse::project_events_sse))
        // Columns
        .route(
            "/api/v1/projects/{id}/columns",
            post(routes::projects::add_column),
        )
        .route(
            "/api/v1/projects/{id}/columns/{column_id}",
            get(routes::projects::get_column)
                .patch(routes::projects::update_column)
                .delete(routes::projects::delete_column),
        )
        // Cards
        .route(
            "/api/v1/projects/{id}/cards",
            post(routes::projects::add_card),
        )
        .route(
            "/api/v1/projects/{id}/cards/{card_id}",
            get(routes::projects::get_card)
                .patch(routes::projects::update_card)
                .delete(routes::projects::delete_card),
        )
        .route(
            "/api/v1/projects/{id}/cards/{card_id}/move",
            post(routes::projects::move_card),
        )
        .route(
            "/api/v1/projects/{id}/cards/{card_id}/events",
            get(routes::projects::card_events),
        )
        .route(
            "/api/v1/projects/{id}/cards/{card_id}/dependencies",
            post(routes::projects::add_dependency),
        )
        .route(
            "/api/v1/projects/{id}/cards/{card_id}/dependencies/{depends_on_id}",
            axum::routing::delete(routes::projects::remove_dependency),
        )
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}
