// src/store/record.rs

//! Task record type persisted by the store.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier of a task record within one store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TaskId(pub u64);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an external-process invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Record persisted; process not yet spawned.
    Pending,
    /// Process spawned and not yet exited.
    Running,
    /// Process exited cleanly with no recognized error markers.
    Completed,
    /// Process exited nonzero, reported error markers, or could not be
    /// spawned at all.
    Failed,
    /// Process was killed by the supervisor (timeout or explicit kill).
    Killed,
}

impl TaskStatus {
    /// Whether the status is terminal (no further transitions).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Killed
        )
    }
}

/// One external-process invocation, as persisted in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    /// Directory the task runs under; the task's own working directory is a
    /// subdirectory of this.
    pub parent_directory: PathBuf,
    /// Human-readable description, e.g. "Synthesize project."
    pub description: String,
    /// Opaque command payload handed to the process-spawn primitive.
    pub command: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Directory holding captured stdout/stderr for this invocation.
    pub output_dir: Option<PathBuf>,
    /// Classified errors collected from the process output.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl TaskRecord {
    pub fn new(
        id: TaskId,
        parent_directory: PathBuf,
        description: String,
        command: String,
    ) -> Self {
        Self {
            id,
            parent_directory,
            description,
            command,
            status: TaskStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            output_dir: None,
            errors: Vec::new(),
        }
    }
}
