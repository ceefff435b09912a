// src/exec/mod.rs

//! Supervised external-process execution.
//!
//! Each job the external toolchain runs is wrapped in a [`SupervisedTask`]:
//! a durable record is persisted *before* the process is spawned, the process
//! runs in the background under a tokio supervisor, and callers observe
//! progress by polling the task state or the record in the store.
//!
//! - [`supervised`] owns the per-job lifecycle state machine.
//! - [`markers`] classifies captured tool output into domain errors.

pub mod markers;
pub mod supervised;

pub use supervised::{SupervisedTask, TaskState, POLL_INTERVAL};
