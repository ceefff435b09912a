// src/store/file_store.rs

//! File-backed task record collection.
//!
//! One JSON file per record, `<root>/task_<id>.json`. Insertion uses
//! `File::create_new` (O_EXCL), so two supervising processes allocating ids
//! against the same store never clobber each other; the loser just retries
//! with the next id. Updates go through an atomic sibling-rename so a reader
//! never observes a partially written record.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use std::io::Write;
use tracing::{debug, info};

use crate::errors::{HdlflowError, Result};
use crate::fsutil;
use crate::store::record::{TaskId, TaskRecord};

/// Durable, queryable collection of task records.
#[derive(Debug, Clone)]
pub struct FileTaskStore {
    root: PathBuf,
}

impl FileTaskStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating task store root {:?}", root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: TaskId) -> PathBuf {
        self.root.join(format!("task_{}.json", id.0))
    }

    /// Allocate a fresh id and persist a Pending record.
    ///
    /// The record is durable before this returns, so a crash between `create`
    /// and the process spawn leaves an observable orphaned Pending record
    /// rather than no trace at all.
    pub fn create(
        &self,
        parent_directory: &Path,
        description: &str,
        command: &str,
    ) -> Result<TaskRecord> {
        let mut id = self.next_id()?;
        loop {
            let record = TaskRecord::new(
                id,
                parent_directory.to_path_buf(),
                description.to_string(),
                command.to_string(),
            );
            let path = self.record_path(id);
            match fs::File::create_new(&path) {
                Ok(mut file) => {
                    let contents = serde_json::to_vec_pretty(&record)?;
                    file.write_all(&contents).with_context(|| {
                        format!("writing task record {:?}", path)
                    })?;
                    file.sync_all()
                        .with_context(|| format!("syncing task record {:?}", path))?;
                    info!(
                        id = %record.id,
                        parent = ?record.parent_directory,
                        description = %record.description,
                        "created task record"
                    );
                    return Ok(record);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    // Another process claimed this id; take the next one.
                    debug!(id = %id, "task id taken; retrying with next");
                    id = TaskId(id.0 + 1);
                }
                Err(e) => {
                    return Err(HdlflowError::from(e));
                }
            }
        }
    }

    /// Persist an updated record atomically.
    ///
    /// Presence is checked by reading the record itself, so one removed
    /// concurrently reports `TaskNotFound` rather than an I/O fault, and a
    /// dropped record is never resurrected by a late update.
    pub fn update(&self, record: &TaskRecord) -> Result<()> {
        self.find_by_id(record.id)?;
        let path = self.record_path(record.id);
        let contents = serde_json::to_vec_pretty(record)?;
        fsutil::atomic_write(&path, &contents)?;
        debug!(id = %record.id, status = ?record.status, "updated task record");
        Ok(())
    }

    /// Look up a record by id.
    ///
    /// Absence is `TaskNotFound`; storage faults propagate as themselves.
    pub fn find_by_id(&self, id: TaskId) -> Result<TaskRecord> {
        let path = self.record_path(id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HdlflowError::TaskNotFound(id));
            }
            Err(e) => {
                return Err(anyhow::Error::from(e)
                    .context(format!("reading task record {:?}", path))
                    .into());
            }
        };
        let record: TaskRecord = serde_json::from_str(&contents)?;
        Ok(record)
    }

    /// All records in the store, ordered by id.
    pub fn all(&self) -> Result<Vec<TaskRecord>> {
        let mut records = Vec::new();
        for id in self.record_ids()? {
            records.push(self.find_by_id(id)?);
        }
        Ok(records)
    }

    /// Number of records in the store.
    pub fn count(&self) -> Result<usize> {
        Ok(self.record_ids()?.len())
    }

    /// Remove every record. Test isolation only; production records are
    /// retained until the parent directory is removed.
    pub fn drop_all(&self) -> Result<()> {
        for id in self.record_ids()? {
            let path = self.record_path(id);
            fs::remove_file(&path)
                .with_context(|| format!("removing task record {:?}", path))?;
        }
        Ok(())
    }

    fn next_id(&self) -> Result<TaskId> {
        let max = self.record_ids()?.into_iter().map(|id| id.0).max();
        Ok(TaskId(max.map_or(1, |m| m + 1)))
    }

    fn record_ids(&self) -> Result<Vec<TaskId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)
            .with_context(|| format!("reading task store root {:?}", self.root))?
        {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if let Some(rest) = name
                .strip_prefix("task_")
                .and_then(|s| s.strip_suffix(".json"))
            {
                if let Ok(n) = rest.parse::<u64>() {
                    ids.push(TaskId(n));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
