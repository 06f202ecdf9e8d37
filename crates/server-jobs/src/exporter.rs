// crates/server-jobs/src/exporter.rs
//! Seam between the job runner and the export engine.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use crate::state::ExportJobState;
use crate::types::ExportArtifact;

/// Resolves when an observer cancels the job.
pub type CancelSignal = oneshot::Receiver<()>;

/// Produces the export artifact for a started job.
///
/// Implementations read the configuration from `job.handle()` and report
/// through [`ExportJobState::set_progress`] and
/// [`ExportJobState::add_message`]. The runner owns the status transitions:
/// returning `Ok` completes the job, `Err` fails it.
#[async_trait]
pub trait ProjectExporter: Send + Sync {
    async fn export(
        &self,
        job: Arc<ExportJobState>,
        cancel: CancelSignal,
    ) -> Result<ExportArtifact, String>;
}
