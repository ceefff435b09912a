// src/fingerprint.rs

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use blake3::Hasher;
use tracing::{debug, warn};

use crate::errors::Result;
use crate::fsutil;

/// Relative path (from the project directory) to the persisted fingerprint.
pub const FINGERPRINT_FILE: &str = "fingerprint";

/// Deterministic digest over a project's declared dependency set.
///
/// A pure function of dependency identities and contents: no timestamps, no
/// iteration order. Two equivalent dependency sets always fingerprint equal;
/// any content change fingerprints different.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the content hash of a single file.
pub fn compute_file_hash(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    let mut file = File::open(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Compute the fingerprint of a dependency set.
///
/// Order of `paths` does not matter; we sort before hashing so unrelated
/// reordering of a dependency list never looks like a change. Each entry
/// contributes its identity (path bytes) and its content digest, so both a
/// renamed file and an edited file register as changes.
pub fn compute_fingerprint<I, P>(paths: I) -> Result<Fingerprint>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut paths_vec: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();
    paths_vec.sort();

    let mut hasher = Hasher::new();
    for path in paths_vec {
        if path.is_file() {
            debug!("hashing dependency {:?}", path);
            hasher.update(path.as_os_str().as_encoded_bytes());
            let file_hash = compute_file_hash(&path)?;
            hasher.update(file_hash.as_bytes());
        }
    }

    let fp = Fingerprint(hasher.finalize().to_hex().to_string());
    debug!(fingerprint = %fp, "computed dependency fingerprint");
    Ok(fp)
}

/// Persists the fingerprint of one project directory.
pub struct FingerprintStore {
    path: PathBuf,
}

impl FingerprintStore {
    pub fn new(project_dir: &Path) -> Self {
        Self {
            path: project_dir.join(FINGERPRINT_FILE),
        }
    }

    pub fn read(&self) -> Result<Option<Fingerprint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading fingerprint file {:?}", self.path))?;
        let trimmed = contents.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        Ok(Some(Fingerprint(trimmed.to_string())))
    }

    /// Persist `current` atomically.
    pub fn write(&self, current: &Fingerprint) -> Result<()> {
        fsutil::atomic_write(&self.path, current.as_str().as_bytes())?;
        debug!(path = ?self.path, fingerprint = %current, "stored fingerprint");
        Ok(())
    }

    /// Compare `current` against the persisted value.
    ///
    /// A missing persisted fingerprint reports changed; it is never silently
    /// treated as "unchanged".
    pub fn is_changed(&self, current: &Fingerprint) -> Result<bool> {
        match self.read()? {
            Some(stored) => Ok(stored != *current),
            None => {
                warn!(
                    path = ?self.path,
                    "no persisted fingerprint; reporting changed"
                );
                Ok(true)
            }
        }
    }
}
