//! [`Store`] backend over a real directory.
//!
//! Store paths map onto a root directory on the host filesystem. The CLI
//! uses one `DiskStore` to emulate the origin-private store and others as
//! external volumes for import and export.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::{CoreError, CoreResult};
use crate::fs::path::{self, ROOT_DIR};
use crate::fs::store::{StorageEstimate, Store, StoreHandle};
use crate::fs::stream::{ByteSink, ByteSource, ReaderSource, WriterSink, DEFAULT_CHUNK_SIZE};

const DEFAULT_QUOTA: u64 = 10 * 1024 * 1024 * 1024;

/// A [`Store`] rooted at a host directory.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
    chunk_size: usize,
    quota: u64,
}

impl DiskStore {
    /// Opens a store at `root`, creating the directory if needed.
    pub async fn open(root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self {
            root,
            chunk_size: DEFAULT_CHUNK_SIZE,
            quota: DEFAULT_QUOTA,
        })
    }

    pub fn with_quota(self, quota: u64) -> Self {
        Self { quota, ..self }
    }

    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            ..self
        }
    }

    /// The host directory backing the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn host_path(&self, path: &str) -> PathBuf {
        path::components(path)
            .into_iter()
            .fold(self.root.clone(), |acc, part| acc.join(part))
    }

    async fn metadata(&self, path: &str) -> CoreResult<std::fs::Metadata> {
        tokio::fs::metadata(self.host_path(path))
            .await
            .map_err(|e| map_io(e, path))
    }

    async fn require_parent_dir(&self, path: &str) -> CoreResult<()> {
        let parent = path::dirname(path);
        let meta = self.metadata(&parent).await?;
        if !meta.is_dir() {
            return Err(CoreError::NotADirectory(parent));
        }
        Ok(())
    }
}

fn map_io(e: std::io::Error, path: &str) -> CoreError {
    match e.kind() {
        std::io::ErrorKind::NotFound => CoreError::NotFound(path.to_string()),
        _ => CoreError::Io(e),
    }
}

fn handle_from(name: String, metadata: &std::fs::Metadata) -> StoreHandle {
    if metadata.is_dir() {
        StoreHandle::directory(name)
    } else {
        StoreHandle::file(name, metadata.len())
    }
}

#[async_trait]
impl Store for DiskStore {
    async fn read_dir(&self, path: &str) -> CoreResult<Vec<StoreHandle>> {
        if !self.metadata(path).await?.is_dir() {
            return Err(CoreError::NotADirectory(path.to_string()));
        }

        let mut reader = tokio::fs::read_dir(self.host_path(path))
            .await
            .map_err(|e| map_io(e, path))?;
        let mut handles = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    tracing::warn!("skipping unreadable entry {:?}: {e}", entry.path());
                    continue;
                }
            };
            // Handles carry the on-disk name so later lookups hit the same file.
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!("skipping entry with non-UTF-8 name {:?}", raw);
                    continue;
                }
            };
            handles.push(handle_from(name, &metadata));
        }
        Ok(handles)
    }

    async fn stat(&self, path: &str) -> CoreResult<StoreHandle> {
        let metadata = self.metadata(path).await?;
        Ok(handle_from(path::basename(path, None), &metadata))
    }

    async fn create_dir(&self, path: &str) -> CoreResult<()> {
        let target = self.host_path(path);
        match tokio::fs::create_dir_all(&target).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(CoreError::NotADirectory(path.to_string()))
            }
            Err(e) => Err(map_io(e, path)),
        }
    }

    async fn create_file(&self, path: &str) -> CoreResult<()> {
        if path == ROOT_DIR {
            return Err(CoreError::NotAFile(path.to_string()));
        }
        self.require_parent_dir(path).await?;
        tokio::fs::File::create(self.host_path(path))
            .await
            .map_err(|e| map_io(e, path))?;
        Ok(())
    }

    async fn remove(&self, path: &str) -> CoreResult<()> {
        if path == ROOT_DIR {
            return Err(CoreError::InvalidPath(path.to_string()));
        }
        let target = self.host_path(path);
        let metadata = tokio::fs::symlink_metadata(&target)
            .await
            .map_err(|e| map_io(e, path))?;
        if metadata.is_dir() {
            tokio::fs::remove_dir_all(&target).await?;
        } else {
            tokio::fs::remove_file(&target).await?;
        }
        Ok(())
    }

    async fn open_read(&self, path: &str) -> CoreResult<Box<dyn ByteSource>> {
        if self.metadata(path).await?.is_dir() {
            return Err(CoreError::NotAFile(path.to_string()));
        }
        let file = tokio::fs::File::open(self.host_path(path))
            .await
            .map_err(|e| map_io(e, path))?;
        Ok(Box::new(ReaderSource::new(file, self.chunk_size)))
    }

    async fn read_range(&self, path: &str, offset: u64, len: u64) -> CoreResult<Vec<u8>> {
        let mut file = tokio::fs::File::open(self.host_path(path))
            .await
            .map_err(|e| map_io(e, path))?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buffer = Vec::new();
        file.take(len).read_to_end(&mut buffer).await?;
        Ok(buffer)
    }

    async fn open_write(&self, path: &str) -> CoreResult<Box<dyn ByteSink>> {
        if path == ROOT_DIR {
            return Err(CoreError::NotAFile(path.to_string()));
        }
        self.require_parent_dir(path).await?;
        let file = tokio::fs::File::create(self.host_path(path))
            .await
            .map_err(|e| map_io(e, path))?;
        Ok(Box::new(WriterSink::new(file)))
    }

    async fn estimate(&self) -> CoreResult<StorageEstimate> {
        let mut usage = 0u64;
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut reader = match tokio::fs::read_dir(&dir).await {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("skipping {:?} while estimating usage: {e}", dir);
                    continue;
                }
            };
            while let Some(entry) = reader.next_entry().await? {
                let Ok(metadata) = entry.metadata().await else {
                    continue;
                };
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else {
                    usage += metadata.len();
                }
            }
        }
        Ok(StorageEstimate {
            usage,
            quota: self.quota,
        })
    }
}
