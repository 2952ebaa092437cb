//! The host store surface consumed by the explorer.
//!
//! [`Store`] is the abstract hierarchical byte store the file service sits
//! on. Any backend offering these primitives is substitutable: the
//! in-memory [`crate::fs::memory::MemoryStore`] used in tests, or the
//! on-disk [`crate::fs::disk::DiskStore`] used by the CLI. All path
//! arguments are absolute, normalized store paths.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};
use crate::fs::stream::{ByteSink, ByteSource};

/// What a store handle points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleKind {
    Directory,
    File,
}

/// A store record for one directory child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreHandle {
    pub name: String,
    pub kind: HandleKind,
    /// File size in bytes; always `0` for directories.
    pub size: u64,
}

impl StoreHandle {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: HandleKind::Directory,
            size: 0,
        }
    }

    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            kind: HandleKind::File,
            size,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == HandleKind::Directory
    }
}

/// Aggregate consumption reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StorageEstimate {
    pub usage: u64,
    pub quota: u64,
}

/// Hierarchical byte store.
#[async_trait]
pub trait Store: Send + Sync {
    /// Lists the direct children of a directory, in store order.
    async fn read_dir(&self, path: &str) -> CoreResult<Vec<StoreHandle>>;

    /// Returns the handle for `path`.
    async fn stat(&self, path: &str) -> CoreResult<StoreHandle>;

    /// Returns `true` if something exists at `path`.
    async fn exists(&self, path: &str) -> CoreResult<bool> {
        match self.stat(path).await {
            Ok(_) => Ok(true),
            Err(CoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Creates a directory and any missing parents. Existing directories are fine.
    async fn create_dir(&self, path: &str) -> CoreResult<()>;

    /// Creates an empty file, truncating an existing one.
    async fn create_file(&self, path: &str) -> CoreResult<()>;

    /// Removes a file or a directory tree.
    async fn remove(&self, path: &str) -> CoreResult<()>;

    /// Opens a chunked reader over the file's bytes.
    async fn open_read(&self, path: &str) -> CoreResult<Box<dyn ByteSource>>;

    /// Reads up to `len` bytes starting at `offset`; short near end of file.
    async fn read_range(&self, path: &str, offset: u64, len: u64) -> CoreResult<Vec<u8>>;

    /// Opens a writer that replaces the file's contents, creating it if needed.
    async fn open_write(&self, path: &str) -> CoreResult<Box<dyn ByteSink>>;

    /// Reports usage and quota.
    async fn estimate(&self) -> CoreResult<StorageEstimate>;
}

/// A writable location outside the service's own store.
#[derive(Clone)]
pub struct PickedDirectory {
    pub store: Arc<dyn Store>,
    pub path: String,
}

/// Interactive picker for an export destination.
#[async_trait]
pub trait DirectoryPicker: Send + Sync {
    /// Asks the host for a destination directory.
    ///
    /// Returns [`CoreError::Cancelled`] when the user declines.
    async fn pick_directory(&self) -> CoreResult<PickedDirectory>;
}

/// A picker that always answers with the same location.
pub struct FixedPicker {
    target: PickedDirectory,
}

impl FixedPicker {
    pub fn new(store: Arc<dyn Store>, path: impl Into<String>) -> Self {
        Self {
            target: PickedDirectory {
                store,
                path: path.into(),
            },
        }
    }
}

#[async_trait]
impl DirectoryPicker for FixedPicker {
    async fn pick_directory(&self) -> CoreResult<PickedDirectory> {
        Ok(self.target.clone())
    }
}
