// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use curation_export_jobs::{ExportJobRunner, JobsConfig, ProjectExporter};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Runner that owns every export job and its status handle.
    pub runner: Arc<ExportJobRunner>,
    /// Export engine invoked for each started job.
    pub exporter: Arc<dyn ProjectExporter>,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    pub fn new(exporter: Arc<dyn ProjectExporter>) -> Arc<Self> {
        Self::with_jobs_config(JobsConfig::default(), exporter)
    }

    pub fn with_jobs_config(config: JobsConfig, exporter: Arc<dyn ProjectExporter>) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            runner: Arc::new(ExportJobRunner::with_config(config)),
            exporter,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
