// crates/server/src/routes/exports.rs
//! API routes for project export jobs.
//!
//! - POST   /exports — Start an export
//! - GET    /exports — List active exports
//! - GET    /exports/stream — SSE stream of export progress updates
//! - GET    /exports/{id} — Progress of one export
//! - GET    /exports/{id}/messages?since=N — New messages since a cursor
//! - DELETE /exports/{id} — Cancel an export

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use curation_export_jobs::{
    ExportArtifact, ExportJobHandle, ExportJobSnapshot, ExportProgress, ExportStatus, JobId,
    ProjectRef, FORMAT_AUTO,
};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use utoipa::{OpenApi, ToSchema};

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::AppState;

/// Body of `POST /api/exports`.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateExportRequest {
    /// Target project. Required; omitting it is rejected with 400.
    pub project: Option<ProjectRef>,
    /// Output format, `AUTO` when omitted.
    pub format: Option<String>,
    pub include_in_progress: bool,
}

impl CreateExportRequest {
    fn into_handle(self) -> ExportJobHandle {
        let format = self.format.unwrap_or_else(|| FORMAT_AUTO.to_string());
        match self.project {
            Some(project) => {
                ExportJobHandle::for_project(project, format, self.include_in_progress)
            }
            None => ExportJobHandle::deferred(format, self.include_in_progress),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize))]
#[serde(rename_all = "camelCase")]
pub struct CreatedExport {
    pub job_id: JobId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MessagesQuery {
    pub since: usize,
}

/// One page of an incremental message poll.
#[derive(Debug, Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize))]
pub struct MessagesPage {
    pub messages: Vec<String>,
    /// Cursor to send as `since` on the next poll.
    pub next: usize,
}

#[derive(OpenApi)]
#[openapi(
    paths(start_export, list_exports, get_export, export_messages, cancel_export),
    components(schemas(
        CreateExportRequest,
        CreatedExport,
        MessagesPage,
        ExportProgress,
        ExportJobSnapshot,
        ExportArtifact,
        ExportStatus,
        ProjectRef,
        ErrorResponse
    ))
)]
pub struct ExportsApi;

/// POST /api/exports — Start an export job.
#[utoipa::path(
    post,
    path = "/api/exports",
    request_body = CreateExportRequest,
    responses(
        (status = 202, description = "Export started", body = CreatedExport),
        (status = 400, description = "Request is missing its project", body = ErrorResponse)
    )
)]
async fn start_export(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateExportRequest>,
) -> ApiResult<(StatusCode, Json<CreatedExport>)> {
    let handle = request.into_handle();
    let job_id = state.runner.start(handle, Arc::clone(&state.exporter))?;
    Ok((StatusCode::ACCEPTED, Json(CreatedExport { job_id })))
}

/// GET /api/exports — List all active exports.
#[utoipa::path(
    get,
    path = "/api/exports",
    responses((status = 200, description = "Active exports", body = [ExportProgress]))
)]
async fn list_exports(State(state): State<Arc<AppState>>) -> Json<Vec<ExportProgress>> {
    Json(state.runner.active())
}

/// GET /api/exports/{id} — Current progress of one export.
#[utoipa::path(
    get,
    path = "/api/exports/{id}",
    params(("id" = u64, Path, description = "Export job id")),
    responses(
        (status = 200, description = "Export progress", body = ExportProgress),
        (status = 404, description = "Unknown export job", body = ErrorResponse)
    )
)]
async fn get_export(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> ApiResult<Json<ExportProgress>> {
    state
        .runner
        .get(id)
        .map(Json)
        .ok_or(ApiError::JobNotFound(id))
}

/// GET /api/exports/{id}/messages — Messages logged since `since`.
#[utoipa::path(
    get,
    path = "/api/exports/{id}/messages",
    params(
        ("id" = u64, Path, description = "Export job id"),
        ("since" = Option<usize>, Query, description = "Cursor returned by the previous poll")
    ),
    responses(
        (status = 200, description = "New messages", body = MessagesPage),
        (status = 404, description = "Unknown export job", body = ErrorResponse)
    )
)]
async fn export_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<MessagesPage>> {
    let handle = state.runner.handle(id).ok_or(ApiError::JobNotFound(id))?;
    let (messages, next) = handle.messages_since(query.since);
    Ok(Json(MessagesPage { messages, next }))
}

/// DELETE /api/exports/{id} — Cancel an export.
#[utoipa::path(
    delete,
    path = "/api/exports/{id}",
    params(("id" = u64, Path, description = "Export job id")),
    responses(
        (status = 204, description = "Export cancelled"),
        (status = 404, description = "Unknown export job", body = ErrorResponse),
        (status = 409, description = "Export already finished", body = ErrorResponse)
    )
)]
async fn cancel_export(
    State(state): State<Arc<AppState>>,
    Path(id): Path<JobId>,
) -> ApiResult<StatusCode> {
    // The job is cancelled even when the worker already dropped its signal.
    state.runner.cancel(id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/exports/stream — SSE stream of all export progress updates.
async fn stream_exports(
    State(state): State<Arc<AppState>>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let rx = state.runner.subscribe();

    let stream = async_stream::stream! {
        let mut rx = rx;
        loop {
            match rx.recv().await {
                Ok(progress) => {
                    let json = serde_json::to_string(&progress).unwrap_or_default();
                    yield Ok(Event::default().event("export").data(json));
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Export SSE subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// GET /api/exports/openapi.json — OpenAPI document for these routes.
async fn openapi() -> Json<utoipa::openapi::OpenApi> {
    Json(ExportsApi::openapi())
}

/// Build the exports router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/exports", get(list_exports).post(start_export))
        .route("/exports/stream", get(stream_exports))
        .route("/exports/openapi.json", get(openapi))
        .route("/exports/{id}", get(get_export).delete(cancel_export))
        .route("/exports/{id}/messages", get(export_messages))
}
