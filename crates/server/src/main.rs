// crates/server/src/main.rs
//! Export server binary.
//!
//! Serves the export API backed by a dry-run exporter: jobs walk through
//! their lifecycle and report progress, but no project data is written.
//! Hosts with a real export engine embed the library and call `serve`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use curation_export_jobs::{CancelSignal, ExportArtifact, ExportJobState, ProjectExporter};
use curation_export_server::{init_tracing, serve, ServerConfig};

/// Steps a job from 0 to 100 without touching any project data.
struct DryRunExporter {
    step_delay: Duration,
}

#[async_trait]
impl ProjectExporter for DryRunExporter {
    async fn export(
        &self,
        job: Arc<ExportJobState>,
        mut cancel: CancelSignal,
    ) -> Result<ExportArtifact, String> {
        let handle = job.handle();
        let project = handle.project().cloned().ok_or("no target project")?;
        let format = handle
            .format()
            .map(|f| f.to_string())
            .unwrap_or_default();
        job.add_message(format!("Dry run: exporting {project} as {format}"));
        if handle.is_include_in_progress() {
            job.add_message("Including documents still in progress");
        }

        for step in 1..=10u32 {
            tokio::select! {
                _ = &mut cancel => return Err("cancelled".to_string()),
                _ = tokio::time::sleep(self.step_delay) => {
                    job.advance_progress(step * 10);
                }
            }
        }

        let file = std::env::temp_dir().join(format!("{}-{}.zip", project.name, format));
        Ok(ExportArtifact::new(file, 0))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("warn,curation_export_jobs=info,curation_export_server=info")?;

    let config = ServerConfig::from_env();
    tracing::info!(addr = %config.socket_addr(), "Starting export server (dry run)");

    let exporter = Arc::new(DryRunExporter {
        step_delay: Duration::from_millis(200),
    });
    serve(config, exporter).await
}
