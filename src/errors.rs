// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::store::TaskId;

#[derive(Error, Debug)]
pub enum HdlflowError {
    #[error("Parameter conflict: {0}")]
    ConfigConflict(String),

    #[error("Stale project: {0}")]
    StaleProject(String),

    #[error("Corrupt project: {0}")]
    CorruptProject(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Process supervision error: {0}")]
    Supervision(String),

    #[error("Liveness timeout: {0}")]
    LivenessTimeout(String),

    #[error("Unknown toolchain factory: {0}")]
    UnknownToolchain(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerError(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HdlflowError>;
