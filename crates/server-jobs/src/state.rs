// crates/server-jobs/src/state.rs
//! Lifecycle state for a single export job.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

use crate::handle::ExportJobHandle;
use crate::types::{ExportArtifact, ExportProgress, ExportStatus, JobId};

/// Scheduler-side state wrapped around a published [`ExportJobHandle`].
///
/// Status is an atomic; artifact and error text sit behind `RwLock`s. Every
/// change is broadcast to subscribers as an [`ExportProgress`] snapshot.
pub struct ExportJobState {
    id: JobId,
    handle: Arc<ExportJobHandle>,
    status: AtomicU8,
    artifact: RwLock<Option<ExportArtifact>>,
    error: RwLock<Option<String>>,
    created_at: DateTime<Utc>,
    progress_tx: broadcast::Sender<ExportProgress>,
}

impl ExportJobState {
    pub fn new(id: JobId, handle: ExportJobHandle, capacity: usize) -> Self {
        let (progress_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            id,
            handle: Arc::new(handle),
            status: AtomicU8::new(ExportStatus::Pending as u8),
            artifact: RwLock::new(None),
            error: RwLock::new(None),
            created_at: Utc::now(),
            progress_tx,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// The shared handle observers read from.
    pub fn handle(&self) -> &Arc<ExportJobHandle> {
        &self.handle
    }

    pub fn status(&self) -> ExportStatus {
        ExportStatus::from_u8(self.status.load(Ordering::Acquire))
            .unwrap_or(ExportStatus::Failed)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    // -- Worker reporting -----------------------------------------------------

    /// Log a message on the handle and broadcast if it was new.
    pub fn add_message(&self, message: impl Into<String>) -> bool {
        let appended = self.handle.add_message(message);
        if appended {
            self.broadcast_progress();
        }
        appended
    }

    /// Set progress on the handle and broadcast.
    pub fn set_progress(&self, progress: u32) {
        self.handle.set_progress(progress);
        self.broadcast_progress();
    }

    /// Raise progress on the handle and broadcast.
    pub fn advance_progress(&self, progress: u32) -> u32 {
        let now = self.handle.advance_progress(progress);
        self.broadcast_progress();
        now
    }

    /// Broadcast the current state after the worker wrote the handle directly.
    pub fn report(&self) {
        self.broadcast_progress();
    }

    // -- Transitions ----------------------------------------------------------

    /// Pending -> Running. Returns `false` if the job already left Pending.
    pub fn set_running(&self) -> bool {
        let moved = self
            .status
            .compare_exchange(
                ExportStatus::Pending as u8,
                ExportStatus::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if moved {
            self.broadcast_progress();
        }
        moved
    }

    /// Record the artifact and mark the job completed.
    ///
    /// Ignored (and the artifact dropped) if the job already finished,
    /// e.g. because it was cancelled while the worker was still writing.
    pub fn complete(&self, artifact: ExportArtifact) -> bool {
        if !self.finish_with(&self.artifact, artifact, ExportStatus::Completed) {
            return false;
        }
        self.handle.advance_progress(100);
        self.broadcast_progress();
        true
    }

    /// Mark the job failed with an error message.
    pub fn fail(&self, error: impl Into<String>) -> bool {
        let error = error.into();
        if !self.finish_with(&self.error, error.clone(), ExportStatus::Failed) {
            tracing::debug!(
                job_id = self.id,
                error = %error,
                "Ignoring failure of finished export"
            );
            return false;
        }
        self.broadcast_progress();
        true
    }

    /// Mark the job cancelled.
    pub fn cancel(&self) -> bool {
        let moved = self.finish(ExportStatus::Cancelled);
        if moved {
            self.broadcast_progress();
        }
        moved
    }

    /// Finish the job and fill `slot` in one step. The slot's write guard is
    /// held across the status change, so a reader that sees the terminal
    /// status also sees the value.
    fn finish_with<T>(&self, slot: &RwLock<Option<T>>, value: T, to: ExportStatus) -> bool {
        match slot.write() {
            Ok(mut guard) => {
                if !self.finish(to) {
                    return false;
                }
                *guard = Some(value);
                true
            }
            Err(e) => {
                tracing::error!("RwLock poisoned writing export job state: {e}");
                self.finish(to)
            }
        }
    }

    fn finish(&self, to: ExportStatus) -> bool {
        self.status
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                match ExportStatus::from_u8(current) {
                    Some(status) if !status.is_terminal() => Some(to as u8),
                    _ => None,
                }
            })
            .is_ok()
    }

    // -- Observers ------------------------------------------------------------

    /// Subscribe to progress updates for this specific job.
    pub fn subscribe(&self) -> broadcast::Receiver<ExportProgress> {
        self.progress_tx.subscribe()
    }

    /// Get a snapshot of the current job state.
    pub fn snapshot(&self) -> ExportProgress {
        ExportProgress {
            job_id: self.id,
            status: self.status(),
            job: self.handle.snapshot(),
            artifact: read_slot(&self.artifact),
            error: read_slot(&self.error),
            created_at: self.created_at.to_rfc3339(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    fn broadcast_progress(&self) {
        // No subscribers is fine.
        let _ = self.progress_tx.send(self.snapshot());
    }
}

fn read_slot<T: Clone>(slot: &RwLock<Option<T>>) -> Option<T> {
    match slot.read() {
        Ok(guard) => guard.clone(),
        Err(e) => {
            tracing::error!("RwLock poisoned reading export job state: {e}");
            None
        }
    }
}
