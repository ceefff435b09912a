// src/fsutil.rs

//! Filesystem helpers for atomic multi-file mutations.
//!
//! Everything that touches more than one file (or replaces a file other
//! processes may be reading) goes through here, so the crash behaviour is
//! defined in exactly one place:
//!
//! - [`atomic_write`]: write-to-sibling-then-rename; readers either see the
//!   old contents or the complete new contents, never a partial file.
//! - [`rotate_pair`]: promote "current" to "old", dropping any previous "old".
//! - [`replace_dir`]: two-phase destructive rebuild of a directory. The stale
//!   tree is renamed aside before the fresh directory is created, so at every
//!   crash point the target path is either absent or a fully created
//!   directory. Leftover `.discard` trees are swept by [`sweep_discarded`].

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, warn};

use crate::errors::Result;

/// Suffix used for the renamed-aside tree during a directory replace.
const DISCARD_SUFFIX: &str = ".discard";

/// Atomically replace the contents of `path`.
///
/// Writes to a `.tmp` sibling and renames over the target. The parent
/// directory is created if missing.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating dir {:?}", parent))?;
    }

    let tmp = staging_path(path);
    fs::write(&tmp, contents)
        .with_context(|| format!("writing staging file {:?}", tmp))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("renaming {:?} -> {:?}", tmp, path))?;

    Ok(())
}

/// The `.tmp` sibling used by [`atomic_write`].
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Rotate `current` to `old`, removing any previous `old` first.
///
/// No-op when `current` does not exist. After a successful call, `old` (if it
/// exists) is the immediately prior generation, never an older one.
pub fn rotate_pair(current: &Path, old: &Path) -> Result<()> {
    if old.exists() {
        fs::remove_file(old)
            .with_context(|| format!("removing previous generation {:?}", old))?;
    }
    if current.exists() {
        fs::rename(current, old)
            .with_context(|| format!("rotating {:?} -> {:?}", current, old))?;
    }
    Ok(())
}

/// Replace `dir` with a fresh empty directory, two-phase.
///
/// Phase 1 renames the existing tree to `<dir>.discard`; phase 2 creates the
/// fresh directory; the renamed tree is then deleted. A crash between phases
/// leaves either no directory (fresh-create on next open) or a complete one,
/// never a half-deleted project.
pub fn replace_dir(dir: &Path) -> Result<()> {
    let discard = discard_path(dir);

    if discard.exists() {
        fs::remove_dir_all(&discard)
            .with_context(|| format!("removing leftover {:?}", discard))?;
    }

    if dir.exists() {
        debug!(dir = ?dir, "renaming stale directory aside");
        fs::rename(dir, &discard)
            .with_context(|| format!("renaming {:?} aside for rebuild", dir))?;
    }

    fs::create_dir_all(dir)
        .with_context(|| format!("creating fresh directory {:?}", dir))?;

    if discard.exists() {
        fs::remove_dir_all(&discard)
            .with_context(|| format!("deleting discarded tree {:?}", discard))?;
    }

    Ok(())
}

/// Remove a leftover `<dir>.discard` tree from an interrupted rebuild.
pub fn sweep_discarded(dir: &Path) -> Result<()> {
    let discard = discard_path(dir);
    if discard.exists() {
        warn!(dir = ?discard, "sweeping discarded tree from interrupted rebuild");
        fs::remove_dir_all(&discard)
            .with_context(|| format!("sweeping {:?}", discard))?;
    }
    Ok(())
}

fn discard_path(dir: &Path) -> PathBuf {
    let mut name = dir.file_name().unwrap_or_default().to_os_string();
    name.push(DISCARD_SUFFIX);
    dir.with_file_name(name)
}
