// src/params.rs

//! Persisted per-project parameter snapshot.
//!
//! Each project directory carries a small TOML file (`params.toml`) recording
//! the parameters it was generated with (target part, target board, plus
//! arbitrary extras). Once a project exists on disk, this snapshot is the
//! source of truth; the lifecycle layer compares caller-supplied values
//! against it on every open.
//!
//! This module is storage only. It does not validate parameter semantics.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::Result;
use crate::fsutil;

/// Relative path (from the project directory) to the parameter snapshot.
pub const PARAMS_FILE: &str = "params.toml";

/// Parameters a project was generated with.
///
/// `extra` is ordered so the serialized form is stable across writes of an
/// equal map.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectParams {
    pub part: Option<String>,
    pub board: Option<String>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ProjectParams {
    pub fn new(part: Option<String>, board: Option<String>) -> Self {
        Self {
            part,
            board,
            extra: BTreeMap::new(),
        }
    }
}

/// Reads and writes the parameter snapshot of one project directory.
pub struct ParamsStore {
    path: PathBuf,
}

impl ParamsStore {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(PARAMS_FILE),
        }
    }

    /// Read the persisted parameters.
    ///
    /// Returns `Ok(None)` when no snapshot has ever been written, which is how
    /// a new project is distinguished from an existing one with empty params.
    pub fn read(&self) -> Result<Option<ProjectParams>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let params: ProjectParams = toml::from_str(&contents)?;
        Ok(Some(params))
    }

    /// Overwrite the snapshot atomically.
    pub fn write(&self, params: &ProjectParams) -> Result<()> {
        let contents = toml::to_string(params)?;
        fsutil::atomic_write(&self.path, contents.as_bytes())?;
        debug!(path = ?self.path, "wrote parameter snapshot");
        Ok(())
    }
}
