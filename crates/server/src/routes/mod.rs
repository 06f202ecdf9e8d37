// crates/server/src/routes/mod.rs
//! API route handlers for the export server.

pub mod exports;
pub mod health;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined API router with all routes under /api prefix.
///
/// Routes:
/// - GET    /api/health - Health check
/// - POST   /api/exports - Start an export job
/// - GET    /api/exports - List active export jobs
/// - GET    /api/exports/stream - SSE stream of export progress
/// - GET    /api/exports/openapi.json - OpenAPI document
/// - GET    /api/exports/{id} - Progress of one export job
/// - GET    /api/exports/{id}/messages - Incremental message poll
/// - DELETE /api/exports/{id} - Cancel an export job
pub fn api_routes(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .merge(health::router())
        .merge(exports::router());

    Router::new().nest("/api", api).with_state(state)
}
