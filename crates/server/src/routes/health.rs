// crates/server/src/routes/health.rs
//! Health check endpoint for the API.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use curation_export_jobs::{ExportProgress, ExportStatus};
use serde::Serialize;

use crate::state::AppState;

/// Number of tracked export jobs per lifecycle bucket.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ExportCounts {
    pub active: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl ExportCounts {
    fn tally(jobs: &[ExportProgress]) -> Self {
        jobs.iter().fold(Self::default(), |mut counts, job| {
            match job.status {
                ExportStatus::Pending | ExportStatus::Running => counts.active += 1,
                ExportStatus::Completed => counts.completed += 1,
                ExportStatus::Failed => counts.failed += 1,
                ExportStatus::Cancelled => counts.cancelled += 1,
            }
            counts
        })
    }
}

/// Response for the health check endpoint.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    /// Retained jobs only; pruned finished jobs are not counted.
    pub exports: ExportCounts,
}

/// GET /api/health - Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        exports: ExportCounts::tally(&state.runner.all()),
    })
}

/// Create the health routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
