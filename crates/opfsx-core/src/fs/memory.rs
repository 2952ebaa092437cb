//! In-memory [`Store`] backend.
//!
//! Children are listed in creation order, not sorted, like a real host
//! store. Writers stage their bytes and only replace the file contents on
//! `close`; an aborted writer leaves the file as it was when opened.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{CoreError, CoreResult};
use crate::fs::path::{self, ROOT_DIR};
use crate::fs::store::{StorageEstimate, Store, StoreHandle};
use crate::fs::stream::{BufferSource, ByteSink, ByteSource, DEFAULT_CHUNK_SIZE};

const DEFAULT_QUOTA: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
enum Content {
    Dir,
    File(Arc<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Node {
    content: Content,
    seq: u64,
}

#[derive(Debug)]
struct Tree {
    nodes: HashMap<String, Node>,
    next_seq: u64,
}

impl Tree {
    fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            ROOT_DIR.to_string(),
            Node {
                content: Content::Dir,
                seq: 0,
            },
        );
        Self { nodes, next_seq: 1 }
    }

    fn insert(&mut self, path: &str, content: Content) {
        let seq = match self.nodes.get(path) {
            Some(existing) => existing.seq,
            None => {
                self.next_seq += 1;
                self.next_seq
            }
        };
        self.nodes.insert(path.to_string(), Node { content, seq });
    }

    fn require_dir(&self, path: &str) -> CoreResult<()> {
        match self.nodes.get(path).map(|n| &n.content) {
            Some(Content::Dir) => Ok(()),
            Some(Content::File(_)) => Err(CoreError::NotADirectory(path.to_string())),
            None => Err(CoreError::NotFound(path.to_string())),
        }
    }

    fn file(&self, path: &str) -> CoreResult<Arc<Vec<u8>>> {
        match self.nodes.get(path).map(|n| &n.content) {
            Some(Content::File(data)) => Ok(data.clone()),
            Some(Content::Dir) => Err(CoreError::NotAFile(path.to_string())),
            None => Err(CoreError::NotFound(path.to_string())),
        }
    }

    fn prepare_file(&mut self, path: &str) -> CoreResult<()> {
        if path == ROOT_DIR {
            return Err(CoreError::NotAFile(path.to_string()));
        }
        self.require_dir(&path::dirname(path))?;
        match self.nodes.get(path).map(|n| &n.content) {
            Some(Content::Dir) => Err(CoreError::NotAFile(path.to_string())),
            Some(Content::File(_)) => Ok(()),
            None => {
                self.insert(path, Content::File(Arc::new(Vec::new())));
                Ok(())
            }
        }
    }
}

/// A [`Store`] kept entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    tree: Arc<RwLock<Tree>>,
    chunk_size: usize,
    quota: u64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store with a 1 GiB quota.
    pub fn new() -> Self {
        Self {
            tree: Arc::new(RwLock::new(Tree::new())),
            chunk_size: DEFAULT_CHUNK_SIZE,
            quota: DEFAULT_QUOTA,
        }
    }

    /// Sets the quota reported by [`Store::estimate`].
    pub fn with_quota(self, quota: u64) -> Self {
        Self { quota, ..self }
    }

    /// Sets the chunk size handed out by readers.
    pub fn with_chunk_size(self, chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            ..self
        }
    }

    /// Writes `data` to `path` in one go, creating parent directories.
    pub async fn put_file(&self, path: &str, data: impl Into<Vec<u8>>) -> CoreResult<()> {
        let path = path::validate_absolute(path)?;
        self.create_dir(&path::dirname(&path)).await?;
        let mut tree = self.tree.write().await;
        if matches!(tree.nodes.get(&path).map(|n| &n.content), Some(Content::Dir)) {
            return Err(CoreError::NotAFile(path));
        }
        tree.insert(&path, Content::File(Arc::new(data.into())));
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn read_dir(&self, path: &str) -> CoreResult<Vec<StoreHandle>> {
        let tree = self.tree.read().await;
        tree.require_dir(path)?;

        let mut children: Vec<(u64, StoreHandle)> = tree
            .nodes
            .iter()
            .filter(|(key, _)| key.as_str() != ROOT_DIR && path::dirname(key) == path)
            .map(|(key, node)| {
                let name = path::basename(key, None);
                let handle = match &node.content {
                    Content::Dir => StoreHandle::directory(name),
                    Content::File(data) => StoreHandle::file(name, data.len() as u64),
                };
                (node.seq, handle)
            })
            .collect();
        children.sort_by_key(|(seq, _)| *seq);
        Ok(children.into_iter().map(|(_, handle)| handle).collect())
    }

    async fn stat(&self, path: &str) -> CoreResult<StoreHandle> {
        let tree = self.tree.read().await;
        let node = tree
            .nodes
            .get(path)
            .ok_or_else(|| CoreError::NotFound(path.to_string()))?;
        let name = path::basename(path, None);
        Ok(match &node.content {
            Content::Dir => StoreHandle::directory(name),
            Content::File(data) => StoreHandle::file(name, data.len() as u64),
        })
    }

    async fn create_dir(&self, path: &str) -> CoreResult<()> {
        let mut tree = self.tree.write().await;
        let mut current = String::new();
        for component in path::components(path) {
            current.push('/');
            current.push_str(component);
            match tree.nodes.get(&current).map(|n| &n.content) {
                Some(Content::Dir) => {}
                Some(Content::File(_)) => return Err(CoreError::NotADirectory(current)),
                None => tree.insert(&current, Content::Dir),
            }
        }
        Ok(())
    }

    async fn create_file(&self, path: &str) -> CoreResult<()> {
        let mut tree = self.tree.write().await;
        tree.prepare_file(path)?;
        tree.insert(path, Content::File(Arc::new(Vec::new())));
        Ok(())
    }

    async fn remove(&self, path: &str) -> CoreResult<()> {
        if path == ROOT_DIR {
            return Err(CoreError::InvalidPath(path.to_string()));
        }
        let mut tree = self.tree.write().await;
        if tree.nodes.remove(path).is_none() {
            return Err(CoreError::NotFound(path.to_string()));
        }
        let prefix = format!("{path}/");
        tree.nodes.retain(|key, _| !key.starts_with(&prefix));
        Ok(())
    }

    async fn open_read(&self, path: &str) -> CoreResult<Box<dyn ByteSource>> {
        let data = self.tree.read().await.file(path)?;
        Ok(Box::new(BufferSource::new(data, self.chunk_size)))
    }

    async fn read_range(&self, path: &str, offset: u64, len: u64) -> CoreResult<Vec<u8>> {
        let data = self.tree.read().await.file(path)?;
        let start = (offset as usize).min(data.len());
        let end = start.saturating_add(len as usize).min(data.len());
        Ok(data[start..end].to_vec())
    }

    async fn open_write(&self, path: &str) -> CoreResult<Box<dyn ByteSink>> {
        self.tree.write().await.prepare_file(path)?;
        Ok(Box::new(MemorySink {
            tree: self.tree.clone(),
            path: path.to_string(),
            staged: Vec::new(),
        }))
    }

    async fn estimate(&self) -> CoreResult<StorageEstimate> {
        let tree = self.tree.read().await;
        let usage = tree
            .nodes
            .values()
            .map(|node| match &node.content {
                Content::File(data) => data.len() as u64,
                Content::Dir => 0,
            })
            .sum();
        Ok(StorageEstimate {
            usage,
            quota: self.quota,
        })
    }
}

struct MemorySink {
    tree: Arc<RwLock<Tree>>,
    path: String,
    staged: Vec<u8>,
}

#[async_trait]
impl ByteSink for MemorySink {
    async fn write(&mut self, chunk: &[u8]) -> CoreResult<()> {
        self.staged.extend_from_slice(chunk);
        Ok(())
    }

    async fn close(&mut self) -> CoreResult<()> {
        let mut tree = self.tree.write().await;
        tree.require_dir(&path::dirname(&self.path))?;
        let data = std::mem::take(&mut self.staged);
        tree.insert(&self.path, Content::File(Arc::new(data)));
        Ok(())
    }

    async fn abort(&mut self) {
        self.staged.clear();
    }
}
