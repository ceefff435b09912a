// src/monitor/message_store.rs

//! Shared message store behind the hardware-monitor channel.
//!
//! The monitor protocol is a pair of keys in a store both sides can reach.
//! Production deployments point [`FileMessageStore`] at a shared directory;
//! tests use [`MemoryMessageStore`].

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Context;

use crate::errors::Result;
use crate::fsutil;

/// Key/value store shared with the hardware monitor process.
pub trait MessageStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One file per key under a shared root. Writes are atomic, so a reader on
/// the other side never sees a half-written request or response.
#[derive(Debug)]
pub struct FileMessageStore {
    root: PathBuf,
}

impl FileMessageStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("creating message store root {:?}", root))?;
        Ok(Self { root })
    }

    fn key_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

impl MessageStore for FileMessageStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.key_path(key);
        if !path.exists() {
            return Ok(None);
        }
        let value = fs::read_to_string(&path)
            .with_context(|| format!("reading message key {:?}", path))?;
        Ok(Some(value))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fsutil::atomic_write(&self.key_path(key), value.as_bytes())
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    map: Mutex<HashMap<String, String>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MessageStore for MemoryMessageStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .map
            .lock()
            .expect("message store lock poisoned")
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.map
            .lock()
            .expect("message store lock poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}
