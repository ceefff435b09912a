// src/project/toolchain.rs

//! Collaborator boundary for the external toolchain.
//!
//! The orchestration layer never interprets command syntax: everything the
//! external tool runs is an opaque payload produced by a [`Toolchain`]
//! implementation. The same trait declares the dependency set the project's
//! generated output is derived from, which is what the fingerprint covers.
//!
//! [`ToolchainRegistry`] re-hydrates a toolchain from the factory name
//! persisted in a project's parameter snapshot. Lookups are validated: an
//! unknown name is a hard error, never a silent miss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::errors::{HdlflowError, Result};
use crate::params::ProjectParams;

/// Key in `ProjectParams::extra` naming the toolchain constructor to use
/// when reopening a project without an explicit toolchain.
pub const FACTORY_NAME_KEY: &str = "factory_name";

/// Simulation flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimType {
    Hdl,
    PostSynthesis,
    Timing,
}

impl SimType {
    pub fn as_str(self) -> &'static str {
        match self {
            SimType::Hdl => "hdl",
            SimType::PostSynthesis => "post_synthesis",
            SimType::Timing => "timing",
        }
    }
}

impl std::fmt::Display for SimType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SimType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hdl" => Ok(SimType::Hdl),
            "post_synthesis" => Ok(SimType::PostSynthesis),
            "timing" => Ok(SimType::Timing),
            other => Err(format!(
                "invalid sim type: {other} (expected \"hdl\", \"post_synthesis\" or \"timing\")"
            )),
        }
    }
}

/// Everything the lifecycle layer needs from the external toolchain.
///
/// Implementations generate the domain-specific command scripts; this crate
/// only tracks, deduplicates and supervises the jobs that run them.
pub trait Toolchain: Send + Sync {
    /// Name under which this toolchain is registered (persisted in the
    /// parameter snapshot for later re-hydration).
    fn factory_name(&self) -> &str;

    /// Files and dependencies the generated project is derived from.
    /// The fingerprint is computed over exactly this set.
    fn dependency_paths(&self) -> Vec<PathBuf>;

    /// Command that generates a fresh project in `dir`.
    fn create_project_command(&self, dir: &Path) -> String;

    fn synthesize_command(&self, dir: &Path, keep_hierarchy: bool) -> String;

    fn implement_command(&self, dir: &Path) -> String;

    fn generate_reports_command(&self, dir: &Path, from_synthesis: bool) -> String;

    fn simulation_command(
        &self,
        dir: &Path,
        test_name: &str,
        runtime: &str,
        sim_type: SimType,
    ) -> String;
}

/// Constructor re-hydrating a toolchain from persisted parameters.
pub type ToolchainCtor =
    Arc<dyn Fn(&ProjectParams) -> Result<Arc<dyn Toolchain>> + Send + Sync>;

/// Registry of toolchain constructors keyed by factory name.
#[derive(Default, Clone)]
pub struct ToolchainRegistry {
    ctors: HashMap<String, ToolchainCtor>,
}

impl ToolchainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, ctor: ToolchainCtor) {
        self.ctors.insert(name.into(), ctor);
    }

    /// Construct the toolchain registered under `name`.
    ///
    /// Fails with `UnknownToolchain` naming the known factories when the
    /// lookup misses.
    pub fn build(&self, name: &str, params: &ProjectParams) -> Result<Arc<dyn Toolchain>> {
        match self.ctors.get(name) {
            Some(ctor) => ctor(params),
            None => {
                let mut known: Vec<&str> = self.ctors.keys().map(String::as_str).collect();
                known.sort();
                Err(HdlflowError::UnknownToolchain(format!(
                    "{name} (known: {known:?})"
                )))
            }
        }
    }
}
