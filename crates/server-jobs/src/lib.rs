// crates/server-jobs/src/lib.rs
//! Status handles and background runner for project exports.
//!
//! Provides:
//! - `ExportJobHandle` — shared configuration, progress and message log of one export
//! - `MessageLog` — ordered, deduplicated, concurrent message log
//! - `ExportJobState` — lifecycle status and progress broadcast per job
//! - `ExportJobRunner` — central manager for starting, polling and cancelling exports
//! - `ProjectExporter` — seam to the export engine

pub mod config;
pub mod error;
pub mod exporter;
pub mod handle;
pub mod messages;
pub mod runner;
pub mod state;
pub mod types;

pub use config::JobsConfig;
pub use error::{ExportError, ExportResult};
pub use exporter::{CancelSignal, ProjectExporter};
pub use handle::ExportJobHandle;
pub use messages::MessageLog;
pub use runner::ExportJobRunner;
pub use state::ExportJobState;
pub use types::{
    ExportArtifact, ExportFormat, ExportJobSnapshot, ExportProgress, ExportStatus, JobId,
    ProjectRef, FORMAT_AUTO,
};
