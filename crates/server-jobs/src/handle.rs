// crates/server-jobs/src/handle.rs
//! Shared status handle for a single project export.
//!
//! The initiating caller configures the handle (project, format, inclusion
//! policy) while it still owns it. Starting the job moves the handle into an
//! `Arc`, after which the configuration is read-only: the setters take
//! `&mut self` and no mutable borrow exists once the handle is shared. The
//! worker then reports through [`ExportJobHandle::set_progress`] and
//! [`ExportJobHandle::add_message`], both of which only need `&self`.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{ExportError, ExportResult};
use crate::messages::MessageLog;
use crate::types::{ExportFormat, ExportJobSnapshot, ProjectRef};

#[derive(Debug, Default)]
pub struct ExportJobHandle {
    project: Option<ProjectRef>,
    format: Option<ExportFormat>,
    include_in_progress: bool,
    /// Percentage, conventionally 0-100.
    progress: AtomicU32,
    messages: MessageLog,
}

impl ExportJobHandle {
    /// Empty handle, to be filled in through the setters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle whose target project is not known yet.
    ///
    /// Call [`set_project`](Self::set_project) before starting the export.
    pub fn deferred(format: impl Into<ExportFormat>, include_in_progress: bool) -> Self {
        Self {
            format: Some(format.into()),
            include_in_progress,
            ..Self::default()
        }
    }

    pub fn for_project(
        project: ProjectRef,
        format: impl Into<ExportFormat>,
        include_in_progress: bool,
    ) -> Self {
        Self {
            project: Some(project),
            format: Some(format.into()),
            include_in_progress,
            ..Self::default()
        }
    }

    // -- Configuration --------------------------------------------------------

    pub fn set_project(&mut self, project: ProjectRef) {
        self.project = Some(project);
    }

    pub fn project(&self) -> Option<&ProjectRef> {
        self.project.as_ref()
    }

    pub fn set_format(&mut self, format: impl Into<ExportFormat>) {
        self.format = Some(format.into());
    }

    pub fn format(&self) -> Option<&ExportFormat> {
        self.format.as_ref()
    }

    pub fn set_include_in_progress(&mut self, include: bool) {
        self.include_in_progress = include;
    }

    /// Whether annotation documents still in progress are exported.
    pub fn is_include_in_progress(&self) -> bool {
        self.include_in_progress
    }

    /// Checks that the handle is fully configured and returns its project.
    pub fn ensure_ready(&self) -> ExportResult<&ProjectRef> {
        let project = self.project.as_ref().ok_or(ExportError::ProjectNotSet)?;
        if self.format.is_none() {
            return Err(ExportError::FormatNotSet);
        }
        Ok(project)
    }

    // -- Progress -------------------------------------------------------------

    pub fn progress(&self) -> u32 {
        self.progress.load(Ordering::Relaxed)
    }

    /// Store a new progress value. Monotonicity is up to the worker.
    pub fn set_progress(&self, progress: u32) {
        self.progress.store(progress, Ordering::Relaxed);
    }

    /// Raise progress to `progress` unless it is already higher.
    /// Returns the value in effect afterwards.
    pub fn advance_progress(&self, progress: u32) -> u32 {
        self.progress
            .fetch_max(progress, Ordering::Relaxed)
            .max(progress)
    }

    // -- Messages -------------------------------------------------------------

    /// Append a diagnostic message unless the same text was already logged.
    pub fn add_message(&self, message: impl Into<String>) -> bool {
        self.messages.push(message)
    }

    /// All messages logged so far, in insertion order.
    pub fn messages(&self) -> Vec<String> {
        self.messages.snapshot()
    }

    /// Messages logged at or after `cursor`, and the next cursor.
    pub fn messages_since(&self, cursor: usize) -> (Vec<String>, usize) {
        self.messages.since(cursor)
    }

    pub fn snapshot(&self) -> ExportJobSnapshot {
        ExportJobSnapshot {
            project: self.project.clone(),
            format: self.format.as_ref().map(|f| f.as_str().to_string()),
            include_in_progress: self.include_in_progress,
            progress: self.progress(),
            messages: self.messages(),
        }
    }
}

impl From<ExportJobSnapshot> for ExportJobHandle {
    fn from(snapshot: ExportJobSnapshot) -> Self {
        Self {
            project: snapshot.project,
            format: snapshot.format.map(ExportFormat::from),
            include_in_progress: snapshot.include_in_progress,
            progress: AtomicU32::new(snapshot.progress),
            messages: snapshot.messages.into_iter().collect(),
        }
    }
}
