// src/lib.rs

//! `hdlflow` drives a third-party hardware-design toolchain (synthesis,
//! simulation, implementation) as a sequence of long-running external jobs,
//! without re-running work whose inputs have not changed.
//!
//! The pieces, leaves first:
//!
//! - [`params`]: per-project parameter snapshot (target part/board), the
//!   source of truth once a project directory exists.
//! - [`fingerprint`]: deterministic digest over the declared dependency set,
//!   persisted per project; answers "has anything changed" without touching
//!   the external tool.
//! - [`store`]: durable task registry; one JSON record per external process
//!   invocation, persisted before the process is spawned.
//! - [`exec`]: supervised process lifecycle (launch, poll, kill, output
//!   capture, error classification).
//! - [`project`]: composes the above into the attach / rebuild / create-fresh
//!   decision and the toolchain operations.
//! - [`harness`]: byte-level change detection over test input vectors.
//! - [`monitor`]: polling request/response client for the hardware-monitor
//!   channel.
//!
//! The external tool is a black box that communicates through generated
//! command scripts, text logs and exit codes; this crate guarantees that
//! stale output is never reused, no running job loses its record, and the
//! same work is never submitted twice for an unchanged project.

pub mod errors;
pub mod exec;
pub mod fingerprint;
pub mod fsutil;
pub mod harness;
pub mod logging;
pub mod monitor;
pub mod params;
pub mod project;
pub mod store;

pub use errors::{HdlflowError, Result};
pub use exec::{SupervisedTask, TaskState};
pub use fingerprint::{Fingerprint, FingerprintStore, compute_fingerprint};
pub use harness::FileDiffHarness;
pub use params::{ParamsStore, ProjectParams};
pub use project::{Project, ProjectOptions, SimType, Toolchain, ToolchainRegistry};
pub use store::{FileTaskStore, TaskId, TaskRecord, TaskStatus};
