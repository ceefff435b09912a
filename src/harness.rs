// src/harness.rs

//! Change detection over test input vectors.
//!
//! Each named test case keeps a versioned file pair under the project
//! directory: `input.data` (current) and `old_input.data` (immediately prior
//! accepted input). [`FileDiffHarness::update_input_data`] rotates the pair
//! and reports whether the bytes changed, so unchanged test vectors never
//! trigger a re-run of the external simulation.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use tracing::debug;

use crate::errors::Result;
use crate::fsutil;
use crate::project::SimType;

const INPUT_FILE: &str = "input.data";
const OLD_INPUT_FILE: &str = "old_input.data";

/// Per-project harness tracking input snapshots by test name.
pub struct FileDiffHarness {
    project_dir: PathBuf,
}

impl FileDiffHarness {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
        }
    }

    fn test_dir(&self, test_name: &str) -> PathBuf {
        self.project_dir.join(test_name)
    }

    pub fn input_path(&self, test_name: &str) -> PathBuf {
        self.test_dir(test_name).join(INPUT_FILE)
    }

    pub fn old_input_path(&self, test_name: &str) -> PathBuf {
        self.test_dir(test_name).join(OLD_INPUT_FILE)
    }

    /// Expected output-data path for a simulation flavour.
    pub fn output_path(&self, test_name: &str, sim_type: SimType) -> PathBuf {
        self.test_dir(test_name)
            .join(format!("{}_output.data", sim_type))
    }

    /// Accept new input data for a test and report whether it differs from
    /// the immediately prior accepted input.
    ///
    /// Sequence: stage the new data, rotate current to old, promote the
    /// staged file to current, then byte-compare old vs. current. Either both
    /// generations exist fully written afterwards, or the operation fails
    /// before the rotation touched anything. A test with no prior input
    /// always reports changed.
    pub fn update_input_data(&self, test_name: &str, data: &[u8]) -> Result<bool> {
        let dir = self.test_dir(test_name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating test directory {:?}", dir))?;

        let input = self.input_path(test_name);
        let old_input = self.old_input_path(test_name);

        let staging = fsutil::staging_path(&input);
        fs::write(&staging, data)
            .with_context(|| format!("staging input data {:?}", staging))?;

        fsutil::rotate_pair(&input, &old_input)?;
        fs::rename(&staging, &input)
            .with_context(|| format!("promoting staged input to {:?}", input))?;

        let changed = if old_input.exists() {
            let old = fs::read(&old_input)
                .with_context(|| format!("reading prior input {:?}", old_input))?;
            old != data
        } else {
            true
        };

        debug!(test = %test_name, changed, "updated input data");
        Ok(changed)
    }
}
