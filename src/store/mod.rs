// src/store/mod.rs

//! Durable task registry.
//!
//! Every external-process invocation gets one [`TaskRecord`], persisted as its
//! own JSON file before the process is spawned. Records survive process and
//! machine restarts, so a monitoring process can observe progress and a crash
//! after spawn still leaves an inspectable trail.
//!
//! - [`record`] defines the record type and its status/timestamps.
//! - [`file_store`] is the file-backed collection keyed by task id.

pub mod file_store;
pub mod record;

pub use file_store::FileTaskStore;
pub use record::{TaskId, TaskRecord, TaskStatus};
