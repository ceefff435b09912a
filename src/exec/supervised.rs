// src/exec/supervised.rs

//! Per-job process lifecycle.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::errors::{HdlflowError, Result};
use crate::exec::markers;
use crate::fsutil;
use crate::store::{FileTaskStore, TaskId, TaskStatus};

/// Fixed backoff interval for state polling in `wait`.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long `run_and_wait` gives a killed process to actually die.
const KILL_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle state of a supervised task.
///
/// `Created -> Running -> {Completed, Failed, Killed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Record persisted, process not yet spawned.
    Created,
    Running,
    Completed,
    Failed,
    Killed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Killed
        )
    }

    fn as_status(self) -> TaskStatus {
        match self {
            TaskState::Created => TaskStatus::Pending,
            TaskState::Running => TaskStatus::Running,
            TaskState::Completed => TaskStatus::Completed,
            TaskState::Failed => TaskStatus::Failed,
            TaskState::Killed => TaskStatus::Killed,
        }
    }
}

/// One supervised external-process invocation.
///
/// The durable [`crate::store::TaskRecord`] always exists before the process
/// does; every state transition is written back to the store so an
/// independent process can observe progress.
pub struct SupervisedTask {
    id: TaskId,
    store: FileTaskStore,
    /// Working directory of this invocation: `<parent>/task_<id>/`.
    directory: PathBuf,
    command: String,
    state: Arc<Mutex<TaskState>>,
    kill_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl SupervisedTask {
    /// Persist a Pending record and prepare the task working directory.
    ///
    /// Durable before return: a crash between `create` and `run` leaves an
    /// observable orphaned Pending record.
    pub fn create(
        store: &FileTaskStore,
        parent_directory: &Path,
        description: &str,
        command: &str,
    ) -> Result<Self> {
        let mut record = store.create(parent_directory, description, command)?;

        let directory = parent_directory.join(format!("task_{}", record.id));
        fs::create_dir_all(&directory)
            .with_context(|| format!("creating task directory {:?}", directory))?;
        fsutil::atomic_write(&directory.join("cmd.sh"), command.as_bytes())?;

        record.output_dir = Some(directory.clone());
        store.update(&record)?;

        debug!(id = %record.id, dir = ?directory, "created supervised task");

        Ok(Self {
            id: record.id,
            store: store.clone(),
            directory,
            command: command.to_string(),
            state: Arc::new(Mutex::new(TaskState::Created)),
            kill_tx: Mutex::new(None),
        })
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        *self.state.lock().expect("task state lock poisoned")
    }

    fn stdout_log(&self) -> PathBuf {
        self.directory.join("stdout.log")
    }

    fn open_log_files(&self) -> Result<(fs::File, fs::File)> {
        let stdout_file = fs::File::create(self.stdout_log())
            .with_context(|| format!("creating stdout log in {:?}", self.directory))?;
        let stderr_file = fs::File::create(self.stderr_log())
            .with_context(|| format!("creating stderr log in {:?}", self.directory))?;
        Ok((stdout_file, stderr_file))
    }

    fn stderr_log(&self) -> PathBuf {
        self.directory.join("stderr.log")
    }

    /// Spawn the external process and return without blocking.
    ///
    /// Calling `run` twice on the same task is a supervision error. A failure
    /// to launch the process at all (e.g. no shell) is raised from here; the
    /// job reporting errors through its own output is not.
    pub async fn run(&self) -> Result<()> {
        {
            let mut state = self.state.lock().expect("task state lock poisoned");
            if *state != TaskState::Created {
                return Err(HdlflowError::Supervision(format!(
                    "run() called twice on task {} (state {:?})",
                    self.id, *state
                )));
            }
            *state = TaskState::Running;
        }

        info!(id = %self.id, cmd = %self.command, "starting task process");

        // Capture output straight into log files; the tool's own artifacts
        // land in the task directory as well. Once the state is Running,
        // every failure to launch must still land in a terminal state.
        let (stdout_file, stderr_file) = match self.open_log_files() {
            Ok(files) => files,
            Err(e) => {
                self.transition(TaskState::Failed, vec![format!("log setup failed: {e}")]);
                return Err(HdlflowError::Supervision(format!(
                    "preparing log capture for task {}: {e}",
                    self.id
                )));
            }
        };

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.command);
            c
        };

        cmd.current_dir(&self.directory)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file))
            .stderr(Stdio::from(stderr_file))
            .kill_on_drop(true);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.transition(TaskState::Failed, vec![format!("spawn failed: {e}")]);
                return Err(HdlflowError::Supervision(format!(
                    "spawning process for task {}: {e}",
                    self.id
                )));
            }
        };

        self.persist_transition(TaskState::Running, Vec::new());

        let (kill_tx, mut kill_rx) = oneshot::channel::<()>();
        *self.kill_tx.lock().expect("kill channel lock poisoned") = Some(kill_tx);

        let id = self.id;
        let store = self.store.clone();
        let state = Arc::clone(&self.state);
        let directory = self.directory.clone();
        let stdout_log = self.stdout_log();
        let stderr_log = self.stderr_log();

        tokio::spawn(async move {
            let (final_state, errors) = tokio::select! {
                status_res = child.wait() => match status_res {
                    Ok(status) => {
                        let code = status.code().unwrap_or(-1);
                        let mut errors = scan_logs(&directory, &stdout_log, &stderr_log);
                        let final_state = if status.success() && errors.is_empty() {
                            TaskState::Completed
                        } else {
                            TaskState::Failed
                        };
                        if !status.success() && errors.is_empty() {
                            // The tool died without saying why in its log;
                            // a failed job must still report at least one error.
                            errors.push(format!(
                                "process exited with code {code} and no recognized error markers"
                            ));
                        }
                        info!(
                            id = %id,
                            exit_code = code,
                            errors = errors.len(),
                            "task process exited"
                        );
                        (final_state, errors)
                    }
                    Err(e) => {
                        error!(id = %id, error = %e, "failed polling task process");
                        (TaskState::Failed, vec![format!("wait failed: {e}")])
                    }
                },

                _ = &mut kill_rx => {
                    info!(id = %id, "kill requested; terminating task process");
                    if let Err(e) = child.kill().await {
                        warn!(id = %id, error = %e, "failed to kill task process");
                    }
                    (TaskState::Killed, Vec::new())
                }
            };

            *state.lock().expect("task state lock poisoned") = final_state;
            persist_state(&store, id, final_state, errors);
        });

        Ok(())
    }

    /// Blocking poll until the task reaches a terminal state or the deadline
    /// passes. Never spawns, never kills; returns the state seen last.
    pub async fn wait(&self, timeout: Option<Duration>) -> Result<TaskState> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let state = self.state();
            if state.is_terminal() {
                return Ok(state);
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    debug!(id = %self.id, state = ?state, "wait deadline passed");
                    return Ok(state);
                }
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// `run` followed by `wait`; on timeout the process is killed and the
    /// task ends in `Killed`.
    pub async fn run_and_wait(&self, timeout: Option<Duration>) -> Result<TaskState> {
        self.run().await?;
        let state = self.wait(timeout).await?;
        if state.is_terminal() {
            return Ok(state);
        }

        warn!(id = %self.id, "task exceeded its deadline; killing");
        self.kill()?;
        let state = self.wait(Some(KILL_GRACE)).await?;
        if !state.is_terminal() {
            return Err(HdlflowError::LivenessTimeout(format!(
                "task {} did not terminate within {:?} of being killed",
                self.id, KILL_GRACE
            )));
        }
        Ok(state)
    }

    /// Ask the supervisor to kill the process. No-op if the task already
    /// reached a terminal state.
    pub fn kill(&self) -> Result<()> {
        let tx = self.kill_tx.lock().expect("kill channel lock poisoned").take();
        match tx {
            Some(tx) => {
                if tx.send(()).is_err() {
                    debug!(id = %self.id, "process already finished while killing");
                }
                Ok(())
            }
            None => {
                debug!(id = %self.id, "kill requested but task has no live process");
                Ok(())
            }
        }
    }

    /// Classified domain errors from the captured output.
    ///
    /// Missing output artifacts are themselves one synthetic error; a clean
    /// run yields an empty list. Domain errors are returned, never raised, so
    /// callers can decide pass/fail policy per call site.
    pub fn get_errors(&self) -> Result<Vec<String>> {
        let stdout_log = self.stdout_log();
        let stderr_log = self.stderr_log();
        if !stdout_log.exists() && !stderr_log.exists() {
            return Ok(vec![markers::missing_output_error(&self.directory)]);
        }
        let mut errors = scan_logs(&self.directory, &stdout_log, &stderr_log);
        // The record may carry errors the logs cannot show, such as a
        // nonzero exit with a silent log.
        let record = self.store.find_by_id(self.id)?;
        for error in record.errors {
            if !errors.contains(&error) {
                errors.push(error);
            }
        }
        Ok(errors)
    }

    /// All captured stdout lines.
    pub fn messages(&self) -> Result<Vec<String>> {
        let log = self.stdout_log();
        if !log.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&log)
            .with_context(|| format!("reading task log {:?}", log))?;
        Ok(contents.lines().map(str::to_string).collect())
    }

    /// Forward captured diagnostics to the logging layer. Side effect only;
    /// never affects task state.
    pub fn log_messages(&self, messages: &[String]) {
        for message in messages {
            info!(id = %self.id, "{}", message);
        }
    }

    fn transition(&self, new_state: TaskState, errors: Vec<String>) {
        *self.state.lock().expect("task state lock poisoned") = new_state;
        self.persist_transition(new_state, errors);
    }

    fn persist_transition(&self, new_state: TaskState, errors: Vec<String>) {
        persist_state(&self.store, self.id, new_state, errors);
    }
}

/// Scan both captured logs for domain-error markers.
fn scan_logs(directory: &Path, stdout_log: &Path, stderr_log: &Path) -> Vec<String> {
    let mut errors = Vec::new();
    let mut any_artifact = false;
    for log in [stdout_log, stderr_log] {
        match fs::read_to_string(log) {
            Ok(text) => {
                any_artifact = true;
                errors.extend(markers::scan_output(&text));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(log = ?log, error = %e, "failed reading task log");
            }
        }
    }
    if !any_artifact {
        errors.push(markers::missing_output_error(directory));
    }
    errors
}

/// Write a state transition back to the durable record.
///
/// Store faults here are logged, not raised: the supervisor runs detached and
/// has no caller to surface to, and the in-memory state is already correct.
fn persist_state(store: &FileTaskStore, id: TaskId, state: TaskState, errors: Vec<String>) {
    let result = store.find_by_id(id).and_then(|mut record| {
        record.status = state.as_status();
        match state {
            TaskState::Running => record.started_at = Some(Utc::now()),
            s if s.is_terminal() => record.finished_at = Some(Utc::now()),
            _ => {}
        }
        if !errors.is_empty() {
            record.errors = errors;
        }
        store.update(&record)
    });
    if let Err(e) = result {
        error!(id = %id, error = %e, "failed persisting task state transition");
    }
}
