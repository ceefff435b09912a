#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hdlflow::errors::Result;
use hdlflow::project::{PROJECT_MARKER, SimType, Toolchain, ToolchainRegistry};

/// A scriptable [`Toolchain`] for tests.
///
/// Every command is a plain shell snippet; by default the creation command
/// writes the project marker (like the real tool does) and everything else
/// just echoes. Individual commands can be overridden to simulate failing or
/// slow jobs.
#[derive(Debug, Clone)]
pub struct FakeToolchain {
    factory_name: String,
    deps: Vec<PathBuf>,
    create_override: Option<String>,
    synthesize_override: Option<String>,
    simulation_override: Option<String>,
}

impl FakeToolchain {
    pub fn new(deps: Vec<PathBuf>) -> Self {
        Self {
            factory_name: "fake".to_string(),
            deps,
            create_override: None,
            synthesize_override: None,
            simulation_override: None,
        }
    }

    pub fn with_factory_name(mut self, name: &str) -> Self {
        self.factory_name = name.to_string();
        self
    }

    pub fn with_create_command(mut self, cmd: &str) -> Self {
        self.create_override = Some(cmd.to_string());
        self
    }

    pub fn with_synthesize_command(mut self, cmd: &str) -> Self {
        self.synthesize_override = Some(cmd.to_string());
        self
    }

    pub fn with_simulation_command(mut self, cmd: &str) -> Self {
        self.simulation_override = Some(cmd.to_string());
        self
    }
}

impl Toolchain for FakeToolchain {
    fn factory_name(&self) -> &str {
        &self.factory_name
    }

    fn dependency_paths(&self) -> Vec<PathBuf> {
        self.deps.clone()
    }

    fn create_project_command(&self, dir: &Path) -> String {
        self.create_override.clone().unwrap_or_else(|| {
            format!(
                "touch {}/{} && echo 'project created'",
                dir.display(),
                PROJECT_MARKER
            )
        })
    }

    fn synthesize_command(&self, dir: &Path, keep_hierarchy: bool) -> String {
        self.synthesize_override.clone().unwrap_or_else(|| {
            format!(
                "echo 'synthesize {} keep_hierarchy={}'",
                dir.display(),
                keep_hierarchy
            )
        })
    }

    fn implement_command(&self, dir: &Path) -> String {
        format!("echo 'implement {}'", dir.display())
    }

    fn generate_reports_command(&self, dir: &Path, from_synthesis: bool) -> String {
        format!(
            "echo 'reports {} from_synthesis={}'",
            dir.display(),
            from_synthesis
        )
    }

    fn simulation_command(
        &self,
        dir: &Path,
        test_name: &str,
        runtime: &str,
        sim_type: SimType,
    ) -> String {
        self.simulation_override.clone().unwrap_or_else(|| {
            let out_dir = dir.join(test_name);
            format!(
                "mkdir -p {out} && printf 'sim-data' > {out}/{sim}_output.data \
                 && echo 'simulated for {runtime}'",
                out = out_dir.display(),
                sim = sim_type,
            )
        })
    }
}

/// Write a set of dependency files under `root` and return their paths.
pub fn write_deps(root: &Path, files: &[(&str, &str)]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for (name, contents) in files {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("creating dependency dir");
        }
        fs::write(&path, contents).expect("writing dependency file");
        paths.push(path);
    }
    paths
}

/// Registry with the given fake toolchain registered under its factory name.
pub fn registry_with(fake: FakeToolchain) -> ToolchainRegistry {
    let mut registry = ToolchainRegistry::new();
    let name = fake.factory_name.clone();
    registry.register(
        name,
        Arc::new(move |_params| -> Result<Arc<dyn Toolchain>> {
            Ok(Arc::new(fake.clone()))
        }),
    );
    registry
}
