// crates/server-jobs/src/runner.rs
//! Central runner that starts and tracks export jobs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};

use crate::config::JobsConfig;
use crate::error::{ExportError, ExportResult};
use crate::exporter::ProjectExporter;
use crate::handle::ExportJobHandle;
use crate::state::ExportJobState;
use crate::types::{ExportProgress, JobId};

struct JobEntry {
    state: Arc<ExportJobState>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

/// Central runner that manages all export jobs.
///
/// Thread-safe via `Arc` wrapping. Call `start` to publish a configured
/// handle and spawn its worker, and `subscribe` for SSE-compatible updates.
pub struct ExportJobRunner {
    config: JobsConfig,
    next_id: AtomicU64,
    jobs: RwLock<HashMap<JobId, JobEntry>>,
    global_tx: broadcast::Sender<ExportProgress>,
}

impl ExportJobRunner {
    pub fn new() -> Self {
        Self::with_config(JobsConfig::default())
    }

    pub fn with_config(config: JobsConfig) -> Self {
        let (global_tx, _) = broadcast::channel(config.global_broadcast_capacity.max(1));
        Self {
            config,
            next_id: AtomicU64::new(1),
            jobs: RwLock::new(HashMap::new()),
            global_tx,
        }
    }

    pub fn config(&self) -> &JobsConfig {
        &self.config
    }

    /// Publish `handle` and run `exporter` on it in the background.
    ///
    /// Fails fast with [`ExportError::ProjectNotSet`] or
    /// [`ExportError::FormatNotSet`] if the handle is not fully configured.
    /// Must be called from within a tokio runtime.
    pub fn start(
        &self,
        handle: ExportJobHandle,
        exporter: Arc<dyn ProjectExporter>,
    ) -> ExportResult<JobId> {
        let project = handle.ensure_ready()?;
        let project_id = project.id;
        let format = handle
            .format()
            .map(|f| f.as_str().to_string())
            .unwrap_or_default();

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = Arc::new(ExportJobState::new(id, handle, self.config.broadcast_capacity));
        let (cancel_tx, cancel_rx) = oneshot::channel();

        // Subscribe before the worker can send its first update.
        let mut rx = state.subscribe();

        match self.jobs.write() {
            Ok(mut jobs) => {
                jobs.insert(
                    id,
                    JobEntry {
                        state: Arc::clone(&state),
                        cancel_tx: Some(cancel_tx),
                    },
                );
            }
            Err(e) => tracing::error!("RwLock poisoned writing export jobs map: {e}"),
        }

        tracing::info!(
            job_id = id,
            project_id,
            format = %format,
            include_in_progress = state.handle().is_include_in_progress(),
            "Export job started"
        );

        // Forward job progress to the global channel until the job state is
        // dropped. Workers may still log after a cancel, so a terminal status
        // does not end forwarding.
        let global_tx = self.global_tx.clone();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(progress) => {
                        let _ = global_tx.send(progress);
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(job_id = id, skipped, "Export progress forwarder lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let worker_state = Arc::clone(&state);
        tokio::spawn(async move {
            if !worker_state.set_running() {
                tracing::debug!(job_id = id, "Export job cancelled before it started");
                return;
            }
            match exporter.export(Arc::clone(&worker_state), cancel_rx).await {
                Ok(artifact) => {
                    let file_name = artifact.file_name.clone();
                    if worker_state.complete(artifact) {
                        tracing::info!(
                            job_id = id,
                            project_id,
                            file = %file_name,
                            "Export job completed"
                        );
                    } else {
                        tracing::debug!(job_id = id, "Discarding artifact of finished export");
                    }
                }
                Err(e) => {
                    if worker_state.fail(e.clone()) {
                        tracing::warn!(job_id = id, project_id, error = %e, "Export job failed");
                    }
                }
            }
        });

        self.prune_finished();
        Ok(id)
    }

    /// Cancel a running or pending job.
    ///
    /// Returns whether the cancel signal reached the worker. The job is marked
    /// cancelled either way.
    pub fn cancel(&self, id: JobId) -> ExportResult<bool> {
        let mut jobs = match self.jobs.write() {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!("RwLock poisoned writing export jobs map: {e}");
                return Err(ExportError::JobNotFound(id));
            }
        };
        let entry = jobs.get_mut(&id).ok_or(ExportError::JobNotFound(id))?;
        if !entry.state.cancel() {
            return Err(ExportError::AlreadyFinished(id));
        }
        let delivered = entry
            .cancel_tx
            .take()
            .is_some_and(|tx| tx.send(()).is_ok());
        tracing::info!(job_id = id, delivered, "Export job cancelled");
        Ok(delivered)
    }

    /// Subscribe to all job progress updates (for SSE streaming).
    pub fn subscribe(&self) -> broadcast::Receiver<ExportProgress> {
        self.global_tx.subscribe()
    }

    /// Get current status of a specific job.
    pub fn get(&self, id: JobId) -> Option<ExportProgress> {
        self.state(id).map(|s| s.snapshot())
    }

    /// Shared handle of a specific job.
    pub fn handle(&self, id: JobId) -> Option<Arc<ExportJobHandle>> {
        self.state(id).map(|s| Arc::clone(s.handle()))
    }

    pub fn state(&self, id: JobId) -> Option<Arc<ExportJobState>> {
        match self.jobs.read() {
            Ok(jobs) => jobs.get(&id).map(|e| Arc::clone(&e.state)),
            Err(e) => {
                tracing::error!("RwLock poisoned reading export jobs map: {e}");
                None
            }
        }
    }

    /// All jobs that have not finished yet, oldest first.
    pub fn active(&self) -> Vec<ExportProgress> {
        let mut active: Vec<ExportProgress> = self
            .all()
            .into_iter()
            .filter(|p| !p.status.is_terminal())
            .collect();
        active.sort_by_key(|p| p.job_id);
        active
    }

    /// Every tracked job, oldest first.
    pub fn all(&self) -> Vec<ExportProgress> {
        let mut all: Vec<ExportProgress> = match self.jobs.read() {
            Ok(jobs) => jobs.values().map(|e| e.state.snapshot()).collect(),
            Err(e) => {
                tracing::error!("RwLock poisoned reading export jobs map: {e}");
                Vec::new()
            }
        };
        all.sort_by_key(|p| p.job_id);
        all
    }

    /// Drop the oldest finished jobs beyond `max_retained_finished`.
    /// Returns the number of jobs removed.
    pub fn prune_finished(&self) -> usize {
        let mut jobs = match self.jobs.write() {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!("RwLock poisoned writing export jobs map: {e}");
                return 0;
            }
        };
        let mut finished: Vec<JobId> = jobs
            .iter()
            .filter(|(_, e)| e.state.status().is_terminal())
            .map(|(id, _)| *id)
            .collect();
        if finished.len() <= self.config.max_retained_finished {
            return 0;
        }
        // Newest first; ids are handed out in increasing order.
        finished.sort_unstable_by(|a, b| b.cmp(a));
        let stale = finished.split_off(self.config.max_retained_finished);
        for id in &stale {
            jobs.remove(id);
        }
        tracing::debug!(removed = stale.len(), "Pruned finished export jobs");
        stale.len()
    }
}

impl Default for ExportJobRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exporter::CancelSignal;
    use crate::types::{ExportArtifact, ExportStatus, ProjectRef};
    use async_trait::async_trait;
    use std::time::Duration;

    /// Walks through a fixed number of documents, reporting as it goes.
    struct StepExporter {
        documents: u32,
    }

    #[async_trait]
    impl ProjectExporter for StepExporter {
        async fn export(
            &self,
            job: Arc<ExportJobState>,
            _cancel: CancelSignal,
        ) -> Result<ExportArtifact, String> {
            let project = job.handle().project().cloned().ok_or("no project")?;
            for i in 1..=self.documents {
                job.advance_progress(i * 100 / self.documents);
                job.add_message(format!("Exported document {i}"));
                job.add_message("Using default layer settings");
            }
            Ok(ExportArtifact::new(format!("/tmp/{}.zip", project.name), 64))
        }
    }

    struct FailingExporter;

    #[async_trait]
    impl ProjectExporter for FailingExporter {
        async fn export(
            &self,
            job: Arc<ExportJobState>,
            _cancel: CancelSignal,
        ) -> Result<ExportArtifact, String> {
            job.add_message("Unknown format");
            Err("no writer for format".to_string())
        }
    }

    /// Runs until cancelled.
    struct WaitingExporter;

    #[async_trait]
    impl ProjectExporter for WaitingExporter {
        async fn export(
            &self,
            job: Arc<ExportJobState>,
            cancel: CancelSignal,
        ) -> Result<ExportArtifact, String> {
            tokio::select! {
                _ = cancel => {
                    job.add_message("Cancelled by user");
                    Err("cancelled".to_string())
                }
                _ = tokio::time::sleep(Duration::from_secs(30)) => {
                    Ok(ExportArtifact::new("/tmp/never.zip", 0))
                }
            }
        }
    }

    fn handle() -> ExportJobHandle {
        ExportJobHandle::for_project(ProjectRef::new(9, "treebank"), "AUTO", false)
    }

    async fn wait_until_finished(runner: &ExportJobRunner, id: JobId) -> ExportProgress {
        for _ in 0..100 {
            if let Some(progress) = runner.get(id) {
                if progress.status.is_terminal() {
                    return progress;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("export job {id} did not finish");
    }

    #[tokio::test]
    async fn test_runner_start_and_complete() {
        let runner = ExportJobRunner::new();
        let id = runner
            .start(handle(), Arc::new(StepExporter { documents: 4 }))
            .unwrap();

        let progress = wait_until_finished(&runner, id).await;
        assert_eq!(progress.status, ExportStatus::Completed);
        assert_eq!(progress.job.progress, 100);
        assert_eq!(progress.job.messages.len(), 5);
        assert_eq!(
            progress
                .job
                .messages
                .iter()
                .filter(|m| *m == "Using default layer settings")
                .count(),
            1
        );
        assert_eq!(progress.artifact.unwrap().file_name, "treebank.zip");
    }

    #[tokio::test]
    async fn test_runner_rejects_handle_without_project() {
        let runner = ExportJobRunner::new();
        let result = runner.start(
            ExportJobHandle::deferred("AUTO", true),
            Arc::new(StepExporter { documents: 1 }),
        );
        assert_eq!(result, Err(ExportError::ProjectNotSet));
        assert!(runner.all().is_empty());
    }

    #[tokio::test]
    async fn test_runner_deferred_project_then_start() {
        let runner = ExportJobRunner::new();
        let mut handle = ExportJobHandle::deferred("tsv", true);
        handle.set_project(ProjectRef::new(3, "late-bound"));

        let id = runner
            .start(handle, Arc::new(StepExporter { documents: 1 }))
            .unwrap();
        let shared = runner.handle(id).unwrap();
        assert_eq!(shared.project().map(|p| p.id), Some(3));
        assert!(shared.is_include_in_progress());

        let progress = wait_until_finished(&runner, id).await;
        assert_eq!(progress.status, ExportStatus::Completed);
    }

    #[tokio::test]
    async fn test_runner_failure() {
        let runner = ExportJobRunner::new();
        let id = runner.start(handle(), Arc::new(FailingExporter)).unwrap();

        let progress = wait_until_finished(&runner, id).await;
        assert_eq!(progress.status, ExportStatus::Failed);
        assert_eq!(progress.error.as_deref(), Some("no writer for format"));
        assert_eq!(progress.job.messages, vec!["Unknown format".to_string()]);
    }

    #[tokio::test]
    async fn test_runner_cancellation() {
        let runner = ExportJobRunner::new();
        let id = runner.start(handle(), Arc::new(WaitingExporter)).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runner.active().len(), 1);
        assert_eq!(runner.cancel(id), Ok(true));

        let progress = wait_until_finished(&runner, id).await;
        assert_eq!(progress.status, ExportStatus::Cancelled);
        assert!(progress.error.is_none());

        assert_eq!(runner.cancel(id), Err(ExportError::AlreadyFinished(id)));
        assert_eq!(runner.cancel(999), Err(ExportError::JobNotFound(999)));
        assert!(runner.active().is_empty());
    }

    #[tokio::test]
    async fn test_runner_subscribe() {
        let runner = ExportJobRunner::new();
        let mut rx = runner.subscribe();

        let id = runner
            .start(handle(), Arc::new(StepExporter { documents: 2 }))
            .unwrap();

        let mut last = None;
        while let Ok(Ok(progress)) =
            tokio::time::timeout(Duration::from_millis(500), rx.recv()).await
        {
            assert_eq!(progress.job_id, id);
            let done = progress.status.is_terminal();
            last = Some(progress);
            if done {
                break;
            }
        }
        assert_eq!(last.map(|p| p.status), Some(ExportStatus::Completed));
    }

    #[tokio::test]
    async fn test_runner_subscribe_sees_messages_logged_after_cancel() {
        let runner = ExportJobRunner::new();
        let mut rx = runner.subscribe();
        let id = runner.start(handle(), Arc::new(WaitingExporter)).unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(runner.cancel(id), Ok(true));

        let mut saw_late_message = false;
        while let Ok(Ok(progress)) =
            tokio::time::timeout(Duration::from_millis(500), rx.recv()).await
        {
            if progress.job.messages.iter().any(|m| m == "Cancelled by user") {
                assert_eq!(progress.status, ExportStatus::Cancelled);
                saw_late_message = true;
                break;
            }
        }
        assert!(saw_late_message);
    }

    #[tokio::test]
    async fn test_runner_prunes_oldest_finished() {
        let runner = ExportJobRunner::with_config(JobsConfig {
            max_retained_finished: 2,
            ..JobsConfig::default()
        });

        let mut ids = Vec::new();
        for _ in 0..4 {
            let id = runner
                .start(handle(), Arc::new(StepExporter { documents: 1 }))
                .unwrap();
            wait_until_finished(&runner, id).await;
            ids.push(id);
        }

        runner.prune_finished();
        let kept: Vec<JobId> = runner.all().iter().map(|p| p.job_id).collect();
        assert_eq!(kept, ids[2..].to_vec());
    }

    #[test]
    fn test_runner_default() {
        let runner = ExportJobRunner::default();
        assert!(runner.active().is_empty());
        assert_eq!(runner.config(), &JobsConfig::default());
    }
}
