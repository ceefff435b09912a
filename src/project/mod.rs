// src/project/mod.rs

//! Project lifecycle: attach, rebuild in place, or create fresh.
//!
//! On every open we decide between three paths:
//!
//! 1. the directory does not exist → create fresh;
//! 2. it exists and matches the persisted parameters and fingerprint →
//!    attach, submitting zero jobs;
//! 3. parameters or fingerprint diverged → with `overwrite_ok`, destroy and
//!    regenerate; without it, fail with the specific divergence.
//!
//! The rebuild is destructive (full directory replace) because the external
//! tool exposes no incremental-edit interface here; regenerating from the
//! declared dependency set is the only safe operation. The replace itself is
//! two-phase (see [`crate::fsutil::replace_dir`]).
//!
//! Callers must serialize opens of the same directory across processes;
//! concurrent rebuilds of one directory are not defended against here.

pub mod toolchain;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{debug, error, info};

use crate::errors::{HdlflowError, Result};
use crate::fingerprint::{FingerprintStore, compute_fingerprint};
use crate::fsutil;
use crate::params::{ParamsStore, ProjectParams};
use crate::store::{FileTaskStore, TaskStatus};
use crate::exec::SupervisedTask;

pub use toolchain::{
    FACTORY_NAME_KEY, SimType, Toolchain, ToolchainCtor, ToolchainRegistry,
};

/// Marker artifact the external tool writes when project generation starts
/// producing real output. An existing directory without it is corrupt.
pub const PROJECT_MARKER: &str = "project.prj";

/// Subdirectory of the project holding the task store.
const TASKS_DIR: &str = "tasks";

/// How a project should be opened.
#[derive(Debug, Clone, Default)]
pub struct ProjectOptions {
    /// Target part; `None` inherits the persisted value on reopen.
    pub part: Option<String>,
    /// Target board; `None` inherits the persisted value on reopen.
    pub board: Option<String>,
    /// Permission to destroy and regenerate when parameters or fingerprint
    /// diverged.
    pub overwrite_ok: bool,
}

/// A project directory under management, with its durable task history.
pub struct Project {
    directory: PathBuf,
    params: ProjectParams,
    toolchain: Arc<dyn Toolchain>,
    store: FileTaskStore,
    creation_task: Option<SupervisedTask>,
}

impl Project {
    /// Open a project directory, deciding attach vs. rebuild vs. fresh.
    ///
    /// On the fresh/rebuild path the creation job is submitted
    /// fire-and-forget; it is available through [`Project::creation_task`]
    /// for callers that want to await or inspect it.
    pub async fn open(
        directory: impl Into<PathBuf>,
        toolchain: Arc<dyn Toolchain>,
        options: ProjectOptions,
    ) -> Result<Self> {
        let directory = directory.into();
        debug!(dir = ?directory, "opening project");

        // Leftovers of an interrupted rebuild are garbage by definition.
        fsutil::sweep_discarded(&directory)?;

        let is_new = !directory.exists();

        if !is_new && !directory.join(PROJECT_MARKER).exists() {
            return Err(HdlflowError::CorruptProject(format!(
                "directory {:?} exists but marker {:?} is missing",
                directory, PROJECT_MARKER
            )));
        }

        let params_store = ParamsStore::new(&directory);
        let old_params = params_store.read()?;

        if old_params.is_none() && !is_new {
            return Err(HdlflowError::CorruptProject(format!(
                "no parameter snapshot found in existing project {:?}",
                directory
            )));
        }

        // Caller-supplied None inherits the persisted value.
        let mut new_params = ProjectParams::new(options.part, options.board);
        if let Some(ref old) = old_params {
            if new_params.part.is_none() {
                new_params.part = old.part.clone();
            }
            if new_params.board.is_none() {
                new_params.board = old.board.clone();
            }
            new_params.extra = old.extra.clone();
        }
        new_params
            .extra
            .insert(FACTORY_NAME_KEY.to_string(), toolchain.factory_name().to_string());

        let mut needs_rebuild = false;

        if let Some(ref old) = old_params {
            if *old != new_params {
                if !options.overwrite_ok {
                    return Err(HdlflowError::ConfigConflict(format!(
                        "persisted parameters of {:?} differ from requested: {:?} -> {:?}",
                        directory, old, new_params
                    )));
                }
                info!(dir = ?directory, "parameters changed; project will be rebuilt");
                needs_rebuild = true;
            }
        }

        let current_fp = compute_fingerprint(toolchain.dependency_paths())?;
        if !is_new {
            let fp_store = FingerprintStore::new(&directory);
            if fp_store.is_changed(&current_fp)? {
                if !options.overwrite_ok {
                    return Err(HdlflowError::StaleProject(format!(
                        "dependency fingerprint of {:?} no longer matches the persisted value \
                         (current {})",
                        directory, current_fp
                    )));
                }
                info!(dir = ?directory, "dependencies changed; project will be rebuilt");
                needs_rebuild = true;
            }
        }

        if needs_rebuild {
            // Fail fast instead of wiping a directory with a live job in it.
            let store = FileTaskStore::open(directory.join(TASKS_DIR))?;
            for record in store.all()? {
                if record.status == TaskStatus::Running {
                    return Err(HdlflowError::Supervision(format!(
                        "refusing to rebuild {:?}: task {} is still running",
                        directory, record.id
                    )));
                }
            }
            fsutil::replace_dir(&directory)?;
        } else if is_new {
            std::fs::create_dir_all(&directory)
                .with_context(|| format!("creating project directory {:?}", directory))?;
        }

        let store = FileTaskStore::open(directory.join(TASKS_DIR))?;

        let mut project = Self {
            directory,
            params: new_params,
            toolchain,
            store,
            creation_task: None,
        };

        if is_new || needs_rebuild {
            params_store.write(&project.params)?;
            FingerprintStore::new(&project.directory).write(&current_fp)?;
            project.launch_create_task().await?;
        }

        Ok(project)
    }

    /// Reopen a project using the toolchain named in its persisted params.
    pub async fn open_registered(
        directory: impl Into<PathBuf>,
        registry: &ToolchainRegistry,
        options: ProjectOptions,
    ) -> Result<Self> {
        let directory = directory.into();
        let params = ParamsStore::new(&directory).read()?.ok_or_else(|| {
            HdlflowError::CorruptProject(format!(
                "no parameter snapshot found in {:?}; cannot re-hydrate toolchain",
                directory
            ))
        })?;
        let name = params.extra.get(FACTORY_NAME_KEY).ok_or_else(|| {
            HdlflowError::CorruptProject(format!(
                "parameter snapshot of {:?} has no {:?} entry",
                directory, FACTORY_NAME_KEY
            ))
        })?;
        let toolchain = registry.build(name, &params)?;
        Self::open(directory, toolchain, options).await
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn params(&self) -> &ProjectParams {
        &self.params
    }

    pub fn task_store(&self) -> &FileTaskStore {
        &self.store
    }

    /// The creation job submitted by this open, if any. `None` means the
    /// existing project was attached as-is.
    pub fn creation_task(&self) -> Option<&SupervisedTask> {
        self.creation_task.as_ref()
    }

    pub fn marker_path(&self) -> PathBuf {
        self.directory.join(PROJECT_MARKER)
    }

    async fn launch_create_task(&mut self) -> Result<()> {
        let command = self.toolchain.create_project_command(&self.directory);
        debug!(dir = ?self.directory, cmd = %command, "submitting creation job");
        let task = SupervisedTask::create(
            &self.store,
            &self.directory,
            "Creating a new project.",
            &command,
        )?;
        task.run().await?;
        self.creation_task = Some(task);
        Ok(())
    }

    /// Spawn a job to synthesize the project.
    pub async fn synthesize(&self, keep_hierarchy: bool) -> Result<SupervisedTask> {
        let command = self
            .toolchain
            .synthesize_command(&self.directory, keep_hierarchy);
        self.submit("Synthesize project.", &command).await
    }

    /// Spawn a job to implement the project.
    pub async fn implement(&self) -> Result<SupervisedTask> {
        let command = self.toolchain.implement_command(&self.directory);
        self.submit("Implement project.", &command).await
    }

    /// Spawn a job to generate utilization/power reports.
    pub async fn generate_reports(&self, from_synthesis: bool) -> Result<SupervisedTask> {
        let command = self
            .toolchain
            .generate_reports_command(&self.directory, from_synthesis);
        self.submit("Generate reports.", &command).await
    }

    /// Run a simulation job to completion.
    ///
    /// Returns the domain errors the job reported and the path where the
    /// output data is expected. Parsing the output file belongs to the
    /// result-file collaborator, not this layer.
    pub async fn run_simulation(
        &self,
        test_name: &str,
        runtime: &str,
        sim_type: SimType,
        timeout: Option<Duration>,
    ) -> Result<(Vec<String>, PathBuf)> {
        let command =
            self.toolchain
                .simulation_command(&self.directory, test_name, runtime, sim_type);
        let task = SupervisedTask::create(
            &self.store,
            &self.directory,
            "Running a simulation.",
            &command,
        )?;
        task.run_and_wait(timeout).await?;
        let mut errors = task.get_errors()?;

        let output = self
            .directory
            .join(test_name)
            .join(format!("{}_output.data", sim_type));
        if !output.exists() {
            error!(path = ?output, "simulation produced no output file");
            errors.push(format!("simulation produced no output file at {:?}", output));
        }
        Ok((errors, output))
    }

    /// Path of the utilization report written by `generate_reports`.
    pub fn utilization_file(&self, from_synthesis: bool) -> PathBuf {
        let name = if from_synthesis {
            "synth_utilization.txt"
        } else {
            "impl_utilization.txt"
        };
        self.directory.join(name)
    }

    /// Path of the power report written by `generate_reports`.
    pub fn power_file(&self, from_synthesis: bool) -> PathBuf {
        let name = if from_synthesis {
            "synth_power.txt"
        } else {
            "impl_power.txt"
        };
        self.directory.join(name)
    }

    async fn submit(&self, description: &str, command: &str) -> Result<SupervisedTask> {
        let task = SupervisedTask::create(&self.store, &self.directory, description, command)?;
        task.run().await?;
        Ok(task)
    }
}
