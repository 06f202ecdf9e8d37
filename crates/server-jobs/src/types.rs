// crates/server-jobs/src/types.rs
//! Types shared by the export job handle, runner and HTTP surface.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for an export job.
pub type JobId = u64;

/// Textual form of the auto-detect format sentinel.
pub const FORMAT_AUTO: &str = "AUTO";

/// Reference to the project being exported.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct ProjectRef {
    pub id: u64,
    pub name: String,
}

impl ProjectRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for ProjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Requested output format.
///
/// `Auto` leaves the choice to the export engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Auto,
    Named(String),
}

impl ExportFormat {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Auto => FORMAT_AUTO,
            Self::Named(name) => name,
        }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

impl From<&str> for ExportFormat {
    fn from(s: &str) -> Self {
        if s == FORMAT_AUTO {
            Self::Auto
        } else {
            Self::Named(s.to_string())
        }
    }
}

impl From<String> for ExportFormat {
    fn from(s: String) -> Self {
        if s == FORMAT_AUTO {
            Self::Auto
        } else {
            Self::Named(s)
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ExportStatus {
    Pending = 0,
    Running = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
}

impl ExportStatus {
    /// Convert a raw `u8` into a status variant.
    /// Returns `None` for values outside the valid range.
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::Pending),
            1 => Some(Self::Running),
            2 => Some(Self::Completed),
            3 => Some(Self::Cancelled),
            4 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    /// Completed, cancelled and failed jobs never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// The downloadable result of a finished export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportArtifact {
    pub file_name: String,
    /// Server-local location, never sent to clients.
    #[serde(skip)]
    pub path: PathBuf,
    pub size_bytes: u64,
}

impl ExportArtifact {
    pub fn new(path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            file_name,
            path,
            size_bytes,
        }
    }
}

/// Point-in-time copy of an [`ExportJobHandle`](crate::ExportJobHandle).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportJobSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default)]
    pub include_in_progress: bool,
    #[serde(default)]
    pub progress: u32,
    #[serde(default)]
    pub messages: Vec<String>,
}

/// Progress update for a single export job, sent to pollers and via SSE.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportProgress {
    pub job_id: JobId,
    pub status: ExportStatus,
    #[serde(flatten)]
    pub job: ExportJobSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<ExportArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: String,
    pub timestamp: String,
}
