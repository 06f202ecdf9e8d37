// crates/server-jobs/src/error.rs
use thiserror::Error;

use crate::types::JobId;

/// Errors raised when configuring, starting or controlling export jobs
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExportError {
    #[error("Export request has no target project")]
    ProjectNotSet,

    #[error("Export request has no format")]
    FormatNotSet,

    #[error("Export job not found: {0}")]
    JobNotFound(JobId),

    #[error("Export job {0} has already finished")]
    AlreadyFinished(JobId),
}

pub type ExportResult<T> = Result<T, ExportError>;
