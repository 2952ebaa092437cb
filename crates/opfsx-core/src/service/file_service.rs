//! Navigation, listing and mutations over a [`Store`].
//!
//! [`FileService`] owns the current directory and the published
//! [`NavigationState`]. Every mutating operation validates its paths before
//! touching the store and finishes with a [`FileService::refresh`], which
//! rebuilds the listing and swaps it in as a whole.
//!
//! At most one refresh runs at a time. A refresh requested while another is
//! in flight returns `Ok(None)` immediately without touching the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use futures::future::{join_all, try_join_all};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::cache::ByteCache;
use crate::config::{Config, ExplorerConfig};
use crate::error::{CoreError, CoreResult};
use crate::event::{Command, ServiceEvent};
use crate::fs::entry::{sort_entries, DirectoryEntry, EntryKind};
use crate::fs::path::{self, ROOT_DIR};
use crate::fs::pool::{self, PoolName, HEADER_OFFSET_DATA};
use crate::fs::store::{DirectoryPicker, Store, StoreHandle};
use crate::fs::stream::{self, BufferSource, PipeOptions, VecSink};
use crate::service::object_url::{ObjectBlob, UrlRegistry};
use crate::service::state::NavigationState;
use crate::service::usage;

const EVENT_CAPACITY: usize = 256;

/// The explorer's file service.
///
/// Construct one per store and share it by reference (or `Arc`) with every
/// frontend. Frontends observe changes through [`FileService::subscribe`].
pub struct FileService {
    store: Arc<dyn Store>,
    explorer: ExplorerConfig,
    chunk_size: usize,
    current_path: RwLock<String>,
    state: RwLock<Arc<NavigationState>>,
    refreshing: AtomicBool,
    urls: UrlRegistry,
    contents: Mutex<ByteCache<Arc<Vec<u8>>>>,
    events: broadcast::Sender<ServiceEvent>,
}

/// Holds the refresh latch; releasing it announces the end of the refresh.
struct RefreshGuard<'a> {
    latch: &'a AtomicBool,
    events: &'a broadcast::Sender<ServiceEvent>,
}

impl<'a> RefreshGuard<'a> {
    fn acquire(latch: &'a AtomicBool, events: &'a broadcast::Sender<ServiceEvent>) -> Option<Self> {
        latch
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        let _ = events.send(ServiceEvent::Refreshing(true));
        Some(Self { latch, events })
    }
}

impl Drop for RefreshGuard<'_> {
    fn drop(&mut self) {
        self.latch.store(false, Ordering::Release);
        let _ = self.events.send(ServiceEvent::Refreshing(false));
    }
}

impl FileService {
    /// Creates a service positioned at the root with an empty listing.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidCapacity`] if the content cache capacity is zero.
    pub fn new(store: Arc<dyn Store>, config: &Config) -> CoreResult<Self> {
        let contents = ByteCache::new(config.explorer.content_cache_capacity)?;
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Ok(Self {
            store,
            explorer: config.explorer.clone(),
            chunk_size: config.transfer.chunk_size.max(1),
            current_path: RwLock::new(ROOT_DIR.to_string()),
            state: RwLock::new(Arc::new(NavigationState::initial())),
            refreshing: AtomicBool::new(false),
            urls: UrlRegistry::new(),
            contents: Mutex::new(contents),
            events,
        })
    }

    /// Receives every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<ServiceEvent> {
        self.events.subscribe()
    }

    /// The most recently published listing.
    pub fn snapshot(&self) -> Arc<NavigationState> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// The directory the next refresh will list.
    pub fn current_path(&self) -> String {
        self.current_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    /// `false` at the root.
    pub fn can_go_back(&self) -> bool {
        self.current_path() != ROOT_DIR
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Resolves an object URL from the current listing.
    pub fn object_url(&self, url: &str) -> Option<ObjectBlob> {
        self.urls.resolve(url)
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// Lists the current directory and publishes the result.
    ///
    /// Returns `Ok(None)` if another refresh is already running. On failure
    /// the previous snapshot stays published.
    pub async fn refresh(&self) -> CoreResult<Option<Arc<NavigationState>>> {
        let Some(_guard) = RefreshGuard::acquire(&self.refreshing, &self.events) else {
            debug!("refresh already in flight, skipping");
            return Ok(None);
        };

        let path = self.current_path();
        debug!(path = %path, "refreshing listing");
        let mut object_urls = Vec::new();
        match self.build_state(&path, &mut object_urls).await {
            Ok(state) => {
                let state = Arc::new(state);
                let previous = std::mem::replace(
                    &mut *self.state.write().unwrap_or_else(PoisonError::into_inner),
                    Arc::clone(&state),
                );
                self.urls.revoke_all(previous.object_urls());
                self.emit(ServiceEvent::EntriesChanged(Arc::clone(&state)));
                Ok(Some(state))
            }
            Err(e) => {
                self.urls.revoke_all(&object_urls);
                Err(e)
            }
        }
    }

    async fn build_state(
        &self,
        path: &str,
        object_urls: &mut Vec<String>,
    ) -> CoreResult<NavigationState> {
        let handles = self.store.read_dir(path).await?;
        let in_pool = self.is_pool_dir(path);

        let mut items = Vec::with_capacity(handles.len());
        for handle in handles {
            let mut entry = DirectoryEntry::new(path::resolve(&[path, handle.name.as_str()]), handle);
            self.annotate(&mut entry, in_pool, object_urls).await?;
            items.push(entry);
        }
        sort_entries(&mut items);

        let usage = usage::report(self.store.as_ref()).await?;
        Ok(NavigationState {
            current_path: path.to_string(),
            current_items: items,
            usage,
            object_urls: std::mem::take(object_urls),
        })
    }

    async fn annotate(
        &self,
        entry: &mut DirectoryEntry,
        in_pool: bool,
        object_urls: &mut Vec<String>,
    ) -> CoreResult<()> {
        if entry.kind != EntryKind::File {
            return Ok(());
        }

        if self.explorer.is_image_extension(&path::extname(&entry.name)) {
            match self.read_all(&entry.path, entry.size()).await {
                Ok(bytes) => {
                    let url = self.urls.create(&entry.name, bytes);
                    object_urls.push(url.clone());
                    entry.url = Some(url);
                }
                Err(e) => warn!(path = %entry.path, error = %e, "could not load image for listing"),
            }
        } else if in_pool {
            if let Some(name) = pool::decode_file(self.store.as_ref(), &entry.path).await? {
                entry.kind = EntryKind::PoolFile;
                entry.subname = Some(name.as_str().to_string());
            }
        }
        Ok(())
    }

    fn is_pool_dir(&self, dir: &str) -> bool {
        path::basename(dir, None) == self.explorer.pool_dir_name
    }

    // ------------------------------------------------------------------
    // Navigation
    // ------------------------------------------------------------------

    /// Navigates relative to the current directory.
    pub async fn jump_relative(&self, segment: &str) -> CoreResult<()> {
        let current = self.current_path();
        let target = path::validate_absolute(&path::resolve(&[current.as_str(), segment]))?;
        self.navigate(target).await
    }

    /// Navigates to an absolute path.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidPath`] if `target` is not root-prefixed.
    pub async fn jump_absolute(&self, target: &str) -> CoreResult<()> {
        let target = path::validate_absolute(target)?;
        self.navigate(target).await
    }

    /// Moves to the parent directory. A no-op at the root.
    pub async fn go_up(&self) -> CoreResult<()> {
        if !self.can_go_back() {
            return Ok(());
        }
        self.jump_relative("..").await
    }

    /// Switches the current path and refreshes, restoring the previous path
    /// if the refresh fails.
    async fn navigate(&self, target: String) -> CoreResult<()> {
        debug!(path = %target, "navigating");
        let previous = std::mem::replace(&mut *self.write_path(), target);
        if let Err(e) = self.refresh().await {
            *self.write_path() = previous;
            return Err(e);
        }
        Ok(())
    }

    fn write_path(&self) -> std::sync::RwLockWriteGuard<'_, String> {
        self.current_path
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Creates a directory (and any missing parents) under the current path.
    pub async fn mkdir(&self, name: &str) -> CoreResult<()> {
        let target = self.child_path(name)?;
        debug!(path = %target, "creating directory");
        self.store.create_dir(&target).await?;
        self.refresh().await?;
        Ok(())
    }

    /// Creates an empty file under the current path.
    ///
    /// # Errors
    ///
    /// [`CoreError::AlreadyExists`] if anything already lives at the target.
    pub async fn create_file(&self, name: &str) -> CoreResult<()> {
        let target = self.child_path(name)?;
        if self.store.exists(&target).await? {
            return Err(CoreError::AlreadyExists(target));
        }
        debug!(path = %target, "creating file");
        self.store.create_file(&target).await?;
        self.refresh().await?;
        Ok(())
    }

    fn child_path(&self, name: &str) -> CoreResult<String> {
        if name.trim().is_empty() {
            return Err(CoreError::InvalidName(name.to_string()));
        }
        path::validate_absolute(&path::resolve(&[self.current_path().as_str(), name]))
    }

    /// Imports entries from `source` into the current directory.
    ///
    /// Directories are materialized recursively; files are streamed in full.
    pub async fn save(&self, source: &dyn Store, paths: &[String]) -> CoreResult<()> {
        let sources = validate_all(paths)?;
        let dest_dir = self.current_path();
        self.store.create_dir(&dest_dir).await?;

        for src in &sources {
            let dst = path::resolve(&[dest_dir.as_str(), path::basename(src, None).as_str()]);
            debug!(from = %src, to = %dst, "importing");
            self.copy_entry(source, src, self.store.as_ref(), &dst).await?;
        }
        self.clear_contents();
        self.refresh().await?;
        Ok(())
    }

    /// Deletes every path concurrently.
    ///
    /// All deletions run to completion even if some fail; the first failure
    /// is returned after the listing has been refreshed.
    pub async fn remove(&self, paths: &[String]) -> CoreResult<()> {
        let targets = validate_all(paths)?;
        if targets.iter().any(|p| p == ROOT_DIR) {
            return Err(CoreError::InvalidPath(ROOT_DIR.to_string()));
        }

        debug!(count = targets.len(), "removing entries");
        let results = join_all(targets.iter().map(|p| self.store.remove(p))).await;
        self.clear_contents();

        let failure = results.into_iter().find_map(Result::err);
        let refreshed = self.refresh().await;
        match failure {
            Some(e) => Err(e),
            None => refreshed.map(|_| ()),
        }
    }

    /// Exports entries to a directory chosen through `picker`.
    ///
    /// Pool files with a recovered name are written under that name without
    /// their header. Everything else is copied verbatim.
    pub async fn save_to_disk(&self, paths: &[String], picker: &dyn DirectoryPicker) -> CoreResult<()> {
        let sources = validate_all(paths)?;
        let handles = try_join_all(sources.iter().map(|p| self.store.stat(p))).await?;
        let target = picker.pick_directory().await?;
        let dest_root = path::validate_absolute(&target.path)?;

        let mut pending: Vec<(String, StoreHandle, String)> = sources
            .into_iter()
            .zip(handles)
            .map(|(src, handle)| (src, handle, dest_root.clone()))
            .collect();
        pending.reverse();

        while let Some((src, handle, dest_dir)) = pending.pop() {
            if handle.is_dir() {
                let dir = path::resolve(&[dest_dir.as_str(), handle.name.as_str()]);
                target.store.create_dir(&dir).await?;
                let children = self.store.read_dir(&src).await?;
                for child in children.into_iter().rev() {
                    let child_path = path::resolve(&[src.as_str(), child.name.as_str()]);
                    pending.push((child_path, child, dir.clone()));
                }
            } else {
                let (name, offset) = self.export_name(&src, &handle).await?;
                let dst = path::resolve(&[dest_dir.as_str(), name.as_str()]);
                debug!(from = %src, to = %dst, offset, "exporting");
                self.transfer_file(self.store.as_ref(), &src, target.store.as_ref(), &dst, handle.size, offset)
                    .await?;
            }
        }
        Ok(())
    }

    async fn export_name(&self, src: &str, handle: &StoreHandle) -> CoreResult<(String, u64)> {
        if self.is_pool_dir(&path::dirname(src)) {
            if let Some(PoolName::Named(name)) = pool::decode_file(self.store.as_ref(), src).await? {
                let base = path::basename(&name, None);
                if !base.is_empty() {
                    return Ok((base, HEADER_OFFSET_DATA));
                }
            }
        }
        Ok((handle.name.clone(), 0))
    }

    /// Copies entries into `dest_dir`, recursing into directories.
    pub async fn copy(&self, paths: &[String], dest_dir: &str) -> CoreResult<()> {
        let (sources, dest_dir) = self.prepare_transfer(paths, dest_dir).await?;
        for src in &sources {
            let dst = path::resolve(&[dest_dir.as_str(), path::basename(src, None).as_str()]);
            self.copy_entry(self.store.as_ref(), src, self.store.as_ref(), &dst).await?;
        }
        self.clear_contents();
        self.refresh().await?;
        Ok(())
    }

    /// Moves entries into `dest_dir` by copying and then removing the sources.
    pub async fn move_to(&self, paths: &[String], dest_dir: &str) -> CoreResult<()> {
        let (sources, dest_dir) = self.prepare_transfer(paths, dest_dir).await?;
        for src in &sources {
            let dst = path::resolve(&[dest_dir.as_str(), path::basename(src, None).as_str()]);
            self.copy_entry(self.store.as_ref(), src, self.store.as_ref(), &dst).await?;
            self.store.remove(src).await?;
        }
        self.clear_contents();
        self.refresh().await?;
        Ok(())
    }

    /// Renames an entry within its parent directory.
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidName`] if `new_name` is not a single component.
    /// - [`CoreError::AlreadyExists`] if the new name is taken.
    pub async fn rename(&self, target: &str, new_name: &str) -> CoreResult<()> {
        let src = path::validate_absolute(target)?;
        if !path::is_valid_name(new_name) {
            return Err(CoreError::InvalidName(new_name.to_string()));
        }
        if src == ROOT_DIR {
            return Err(CoreError::InvalidPath(src));
        }

        let dst = path::resolve(&[path::dirname(&src).as_str(), new_name]);
        if dst == src {
            return Ok(());
        }
        if self.store.exists(&dst).await? {
            return Err(CoreError::AlreadyExists(dst));
        }

        debug!(from = %src, to = %dst, "renaming");
        self.copy_entry(self.store.as_ref(), &src, self.store.as_ref(), &dst).await?;
        self.store.remove(&src).await?;
        self.clear_contents();
        self.refresh().await?;
        Ok(())
    }

    async fn prepare_transfer(&self, paths: &[String], dest_dir: &str) -> CoreResult<(Vec<String>, String)> {
        let sources = validate_all(paths)?;
        let dest = path::validate_absolute(dest_dir)?;

        for src in &sources {
            if src == ROOT_DIR || dest == *src || dest.starts_with(&format!("{src}/")) {
                return Err(CoreError::InvalidPath(format!("cannot place {src} inside itself")));
            }
            let dst = path::resolve(&[dest.as_str(), path::basename(src, None).as_str()]);
            if dst == *src {
                return Err(CoreError::AlreadyExists(dst));
            }
        }
        if !self.store.stat(&dest).await?.is_dir() {
            return Err(CoreError::NotADirectory(dest));
        }
        Ok((sources, dest))
    }

    // ------------------------------------------------------------------
    // Contents
    // ------------------------------------------------------------------

    /// Reads a whole file, serving repeated reads from the content cache.
    pub async fn read_file(&self, target: &str) -> CoreResult<Arc<Vec<u8>>> {
        let key = path::validate_absolute(target)?;
        let cached = self.lock_contents().get(&key).cloned();
        if let Some(bytes) = cached {
            debug!(path = %key, "content cache hit");
            return Ok(bytes);
        }

        let handle = self.store.stat(&key).await?;
        if handle.is_dir() {
            return Err(CoreError::NotAFile(key));
        }
        let bytes = Arc::new(self.read_all(&key, handle.size).await?);
        self.lock_contents().set(key, Arc::clone(&bytes));
        Ok(bytes)
    }

    /// Reads a file as text, replacing invalid UTF-8 sequences.
    pub async fn read_text(&self, target: &str) -> CoreResult<String> {
        let bytes = self.read_file(target).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Replaces a file's contents, creating it if needed.
    pub async fn write_file(&self, target: &str, data: Vec<u8>) -> CoreResult<()> {
        let key = path::validate_absolute(target)?;
        if key == ROOT_DIR {
            return Err(CoreError::NotAFile(key));
        }

        let data = Arc::new(data);
        let mut source = BufferSource::new(Arc::clone(&data), self.chunk_size);
        let mut sink = self.store.open_write(&key).await?;
        stream::pipe(&mut source, sink.as_mut(), data.len() as u64, PipeOptions::new()).await?;
        self.lock_contents().set(key.clone(), data);

        if path::dirname(&key) == self.current_path() {
            self.refresh().await?;
        }
        Ok(())
    }

    async fn read_all(&self, target: &str, size: u64) -> CoreResult<Vec<u8>> {
        let mut source = self.store.open_read(target).await?;
        let mut sink = VecSink::new();
        stream::pipe(source.as_mut(), &mut sink, size, PipeOptions::new()).await?;
        Ok(sink.into_bytes())
    }

    fn lock_contents(&self) -> MutexGuard<'_, ByteCache<Arc<Vec<u8>>>> {
        self.contents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn clear_contents(&self) {
        self.lock_contents().clear();
    }

    // ------------------------------------------------------------------
    // Transfers
    // ------------------------------------------------------------------

    async fn copy_entry(&self, from: &dyn Store, src: &str, to: &dyn Store, dst: &str) -> CoreResult<()> {
        let mut pending = vec![(src.to_string(), dst.to_string())];
        while let Some((src, dst)) = pending.pop() {
            let handle = from.stat(&src).await?;
            if handle.is_dir() {
                to.create_dir(&dst).await?;
                for child in from.read_dir(&src).await?.into_iter().rev() {
                    pending.push((
                        path::resolve(&[src.as_str(), child.name.as_str()]),
                        path::resolve(&[dst.as_str(), child.name.as_str()]),
                    ));
                }
            } else {
                self.transfer_file(from, &src, to, &dst, handle.size, 0).await?;
            }
        }
        Ok(())
    }

    /// Streams one file, skipping `offset` leading bytes, and reports
    /// progress on the event channel.
    async fn transfer_file(
        &self,
        from: &dyn Store,
        src: &str,
        to: &dyn Store,
        dst: &str,
        size: u64,
        offset: u64,
    ) -> CoreResult<u64> {
        let name = path::basename(dst, None);
        let events = &self.events;
        let mut source = from.open_read(src).await?;
        let mut sink = to.open_write(dst).await?;

        let options = PipeOptions::new()
            .offset(offset)
            .on_progress(|progress| {
                let _ = events.send(ServiceEvent::TransferProgress {
                    name: name.clone(),
                    path: dst.to_string(),
                    loaded: progress.loaded,
                    percent: progress.percent,
                    total: progress.total,
                });
            })
            .on_done(|| {
                let _ = events.send(ServiceEvent::TransferDone {
                    name: name.clone(),
                    path: dst.to_string(),
                });
            });
        stream::pipe(source.as_mut(), sink.as_mut(), size.saturating_sub(offset), options).await
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Runs a [`Command`], reporting failures as
    /// [`ServiceEvent::OperationFailed`] before returning them.
    pub async fn dispatch(&self, command: Command) -> CoreResult<()> {
        let label = command.label();
        let result = match command {
            Command::Refresh => self.refresh().await.map(|_| ()),
            Command::JumpRelative(segment) => self.jump_relative(&segment).await,
            Command::JumpAbsolute(target) => self.jump_absolute(&target).await,
            Command::GoUp => self.go_up().await,
            Command::Mkdir(name) => self.mkdir(&name).await,
            Command::CreateFile(name) => self.create_file(&name).await,
            Command::Remove(paths) => self.remove(&paths).await,
            Command::Copy(paths, dest) => self.copy(&paths, &dest).await,
            Command::Move(paths, dest) => self.move_to(&paths, &dest).await,
            Command::Rename(target, name) => self.rename(&target, &name).await,
        };
        if let Err(e) = &result {
            self.emit(ServiceEvent::OperationFailed {
                operation: label.to_string(),
                error: e.to_string(),
            });
        }
        result
    }

    fn emit(&self, event: ServiceEvent) {
        // No subscribers is not an error.
        let _ = self.events.send(event);
    }
}

fn validate_all(paths: &[String]) -> CoreResult<Vec<String>> {
    paths.iter().map(|p| path::validate_absolute(p)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::memory::MemoryStore;
    use crate::fs::pool::{encode_header, UNASSOCIATED};
    use crate::fs::store::{FixedPicker, StorageEstimate};
    use crate::fs::stream::{ByteSink, ByteSource};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    fn service(store: &MemoryStore) -> FileService {
        FileService::new(Arc::new(store.clone()), &Config::default()).unwrap()
    }

    fn names(state: &NavigationState) -> Vec<&str> {
        state.current_items.iter().map(|e| e.name.as_str()).collect()
    }

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn pool_file(name: &str, payload: &[u8]) -> Vec<u8> {
        let mut bytes = vec![0u8; HEADER_OFFSET_DATA as usize];
        bytes[..crate::fs::pool::HEADER_SIZE].copy_from_slice(&encode_header(name, 0));
        bytes.extend_from_slice(payload);
        bytes
    }

    fn drain(rx: &mut broadcast::Receiver<ServiceEvent>) -> Vec<ServiceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Delegates to a [`MemoryStore`] but parks `read_dir` until released.
    struct GatedStore {
        inner: MemoryStore,
        entered: Notify,
        gate: Notify,
        listings: AtomicUsize,
    }

    #[async_trait]
    impl Store for GatedStore {
        async fn read_dir(&self, path: &str) -> CoreResult<Vec<StoreHandle>> {
            self.listings.fetch_add(1, Ordering::SeqCst);
            self.entered.notify_one();
            self.gate.notified().await;
            self.inner.read_dir(path).await
        }

        async fn stat(&self, path: &str) -> CoreResult<StoreHandle> {
            self.inner.stat(path).await
        }

        async fn create_dir(&self, path: &str) -> CoreResult<()> {
            self.inner.create_dir(path).await
        }

        async fn create_file(&self, path: &str) -> CoreResult<()> {
            self.inner.create_file(path).await
        }

        async fn remove(&self, path: &str) -> CoreResult<()> {
            self.inner.remove(path).await
        }

        async fn open_read(&self, path: &str) -> CoreResult<Box<dyn ByteSource>> {
            self.inner.open_read(path).await
        }

        async fn read_range(&self, path: &str, offset: u64, len: u64) -> CoreResult<Vec<u8>> {
            self.inner.read_range(path, offset, len).await
        }

        async fn open_write(&self, path: &str) -> CoreResult<Box<dyn ByteSink>> {
            self.inner.open_write(path).await
        }

        async fn estimate(&self) -> CoreResult<StorageEstimate> {
            self.inner.estimate().await
        }
    }

    #[tokio::test]
    async fn refresh_sorts_directories_first() {
        let store = MemoryStore::new();
        store.put_file("/b.txt", "b").await.unwrap();
        store.put_file("/a.txt", "a").await.unwrap();
        store.create_dir("/z").await.unwrap();
        let service = service(&store);

        let state = service.refresh().await.unwrap().unwrap();

        assert_eq!(names(&state), vec!["z", "a.txt", "b.txt"]);
        assert_eq!(state.current_items[1].path, "/a.txt");
        assert_eq!(service.snapshot().current_items.len(), 3);
    }

    #[tokio::test]
    async fn refresh_reports_usage() {
        let store = MemoryStore::new().with_quota(1000);
        store.put_file("/data.bin", vec![0u8; 250]).await.unwrap();
        let service = service(&store);

        let state = service.refresh().await.unwrap().unwrap();

        assert_eq!(state.usage.usage_bytes, 250);
        assert!((state.usage.usage_percent - 25.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn refresh_brackets_with_busy_events() {
        let store = MemoryStore::new();
        let service = service(&store);
        let mut rx = service.subscribe();

        service.refresh().await.unwrap();

        let events = drain(&mut rx);
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], ServiceEvent::Refreshing(true)));
        assert!(matches!(events[1], ServiceEvent::EntriesChanged(_)));
        assert!(matches!(events[2], ServiceEvent::Refreshing(false)));
        assert!(!service.is_refreshing());
    }

    #[tokio::test]
    async fn overlapping_refresh_is_dropped() {
        let inner = MemoryStore::new();
        inner.put_file("/a.txt", "a").await.unwrap();
        let store = Arc::new(GatedStore {
            inner,
            entered: Notify::new(),
            gate: Notify::new(),
            listings: AtomicUsize::new(0),
        });
        let service = FileService::new(store.clone(), &Config::default()).unwrap();

        let (first, second) = tokio::join!(service.refresh(), async {
            store.entered.notified().await;
            let second = service.refresh().await;
            assert!(service.snapshot().current_items.is_empty());
            store.gate.notify_one();
            second
        });

        assert!(second.unwrap().is_none());
        assert_eq!(names(&first.unwrap().unwrap()), vec!["a.txt"]);
        assert_eq!(store.listings.load(Ordering::SeqCst), 1);
        assert!(!service.is_refreshing());
    }

    #[tokio::test]
    async fn failed_navigation_keeps_previous_state() {
        let store = MemoryStore::new();
        store.put_file("/a.txt", "a").await.unwrap();
        let service = service(&store);
        service.refresh().await.unwrap();
        let mut rx = service.subscribe();

        let result = service.jump_absolute("/missing").await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
        assert_eq!(service.current_path(), "/");
        assert_eq!(names(&service.snapshot()), vec!["a.txt"]);
        assert!(!service.is_refreshing());
        let events = drain(&mut rx);
        assert!(matches!(events.last(), Some(ServiceEvent::Refreshing(false))));
    }

    #[tokio::test]
    async fn jumps_and_goes_up() {
        let store = MemoryStore::new();
        store.put_file("/docs/notes/today.md", "x").await.unwrap();
        let service = service(&store);

        assert!(!service.can_go_back());
        service.go_up().await.unwrap();
        assert_eq!(service.current_path(), "/");

        service.jump_relative("docs").await.unwrap();
        service.jump_relative("./notes").await.unwrap();
        assert_eq!(service.current_path(), "/docs/notes");
        assert_eq!(names(&service.snapshot()), vec!["today.md"]);

        service.go_up().await.unwrap();
        assert_eq!(service.snapshot().current_path, "/docs");
        service.jump_absolute("/").await.unwrap();
        assert!(!service.can_go_back());
    }

    #[tokio::test]
    async fn relative_target_is_rejected_before_store_calls() {
        let store = MemoryStore::new();
        let service = service(&store);
        let mut rx = service.subscribe();

        assert!(matches!(
            service.jump_absolute("docs").await,
            Err(CoreError::InvalidPath(_))
        ));
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn mkdir_and_create_file() {
        let store = MemoryStore::new();
        let service = service(&store);

        service.mkdir("photos").await.unwrap();
        service.create_file("readme.txt").await.unwrap();

        assert_eq!(names(&service.snapshot()), vec!["photos", "readme.txt"]);
        assert!(matches!(
            service.create_file("readme.txt").await,
            Err(CoreError::AlreadyExists(p)) if p == "/readme.txt"
        ));
        assert!(matches!(service.mkdir("  ").await, Err(CoreError::InvalidName(_))));
    }

    #[tokio::test]
    async fn remove_runs_every_deletion() {
        let store = MemoryStore::new();
        store.put_file("/a", "1").await.unwrap();
        store.put_file("/b", "2").await.unwrap();
        store.put_file("/c/d", "3").await.unwrap();
        let service = service(&store);

        let result = service.remove(&paths(&["/a", "/missing", "/c"])).await;

        assert!(matches!(result, Err(CoreError::NotFound(_))));
        assert_eq!(names(&service.snapshot()), vec!["b"]);
    }

    #[tokio::test]
    async fn remove_validates_all_paths_first() {
        let store = MemoryStore::new();
        store.put_file("/a", "1").await.unwrap();
        let service = service(&store);

        let result = service.remove(&paths(&["/a", "relative"])).await;

        assert!(matches!(result, Err(CoreError::InvalidPath(_))));
        assert!(store.exists("/a").await.unwrap());
        assert!(matches!(
            service.remove(&paths(&["/"])).await,
            Err(CoreError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn pool_directory_entries_are_promoted() {
        let store = MemoryStore::new();
        store.put_file("/.opaque/AAAA", pool_file("/app.db", b"payload")).await.unwrap();
        store.put_file("/.opaque/BBBB", pool_file("", b"")).await.unwrap();
        store.put_file("/.opaque/CCCC", vec![9u8; 600]).await.unwrap();
        store.put_file("/elsewhere/DDDD", pool_file("/x.db", b"")).await.unwrap();
        let service = service(&store);

        service.jump_absolute("/.opaque").await.unwrap();
        let state = service.snapshot();

        let named = state.item("AAAA").unwrap();
        assert_eq!(named.kind, EntryKind::PoolFile);
        assert_eq!(named.subname.as_deref(), Some("/app.db"));
        let unassociated = state.item("BBBB").unwrap();
        assert_eq!(unassociated.kind, EntryKind::PoolFile);
        assert_eq!(unassociated.subname.as_deref(), Some(UNASSOCIATED));
        assert_eq!(state.item("CCCC").unwrap().kind, EntryKind::File);

        service.jump_absolute("/elsewhere").await.unwrap();
        assert_eq!(service.snapshot().item("DDDD").unwrap().kind, EntryKind::File);
    }

    #[tokio::test]
    async fn decomposed_pool_names_list_on_disk() {
        let tmp = tempfile::TempDir::new().unwrap();
        let nfd = "cafe\u{301}";
        std::fs::create_dir(tmp.path().join(".opaque")).unwrap();
        std::fs::write(
            tmp.path().join(".opaque").join(nfd),
            pool_file("/menu.db", b"espresso"),
        )
        .unwrap();
        let store = crate::fs::disk::DiskStore::open(tmp.path()).await.unwrap();
        let service = FileService::new(Arc::new(store), &Config::default()).unwrap();

        service.jump_absolute("/.opaque").await.unwrap();
        let state = service.snapshot();

        let entry = state.item("caf\u{e9}").unwrap();
        assert_eq!(entry.kind, EntryKind::PoolFile);
        assert_eq!(entry.subname.as_deref(), Some("/menu.db"));
        assert_eq!(entry.path, format!("/.opaque/{nfd}"));
        assert_eq!(service.read_file(&entry.path).await.unwrap().len() as u64, entry.size());
    }

    #[tokio::test]
    async fn image_urls_are_revoked_on_replacement() {
        let store = MemoryStore::new();
        store.put_file("/cat.png", vec![1, 2, 3]).await.unwrap();
        store.put_file("/notes.txt", "text").await.unwrap();
        let service = service(&store);

        let first = service.refresh().await.unwrap().unwrap();
        let old_url = first.item("cat.png").unwrap().url.clone().unwrap();
        assert!(first.item("notes.txt").unwrap().url.is_none());
        let blob = service.object_url(&old_url).unwrap();
        assert_eq!(blob.mime, "image/png");
        assert_eq!(blob.data.as_slice(), &[1, 2, 3]);

        let second = service.refresh().await.unwrap().unwrap();
        let new_url = second.item("cat.png").unwrap().url.clone().unwrap();

        assert_ne!(old_url, new_url);
        assert!(service.object_url(&old_url).is_none());
        assert!(service.object_url(&new_url).is_some());
        assert_eq!(second.object_urls(), &[new_url]);
    }

    #[tokio::test]
    async fn export_strips_pool_header() {
        let store = MemoryStore::new();
        store.put_file("/.opaque/AAAA", pool_file("/data/app.db", b"sqlite")).await.unwrap();
        store.put_file("/.opaque/BBBB", pool_file("", b"zz")).await.unwrap();
        store.put_file("/docs/a.txt", "alpha").await.unwrap();
        store.put_file("/docs/sub/b.txt", "beta").await.unwrap();
        let service = service(&store);

        let volume = MemoryStore::new();
        volume.create_dir("/out").await.unwrap();
        let picker = FixedPicker::new(Arc::new(volume.clone()), "/out");
        let mut rx = service.subscribe();

        service
            .save_to_disk(&paths(&["/.opaque/AAAA", "/.opaque/BBBB", "/docs"]), &picker)
            .await
            .unwrap();

        let read = |p: &'static str| {
            let volume = volume.clone();
            async move { volume.read_range(p, 0, u64::MAX).await.unwrap() }
        };
        assert_eq!(read("/out/app.db").await, b"sqlite");
        assert_eq!(read("/out/BBBB").await.len(), HEADER_OFFSET_DATA as usize + 2);
        assert_eq!(read("/out/docs/a.txt").await, b"alpha");
        assert_eq!(read("/out/docs/sub/b.txt").await, b"beta");

        let done = drain(&mut rx)
            .into_iter()
            .filter(|e| matches!(e, ServiceEvent::TransferDone { .. }))
            .count();
        assert_eq!(done, 4);
    }

    #[tokio::test]
    async fn export_checks_paths_before_picking() {
        let store = MemoryStore::new();
        let service = service(&store);
        let picker = FixedPicker::new(Arc::new(MemoryStore::new()), "/");

        assert!(matches!(
            service.save_to_disk(&paths(&["/missing"]), &picker).await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn import_copies_tree_into_current_directory() {
        let store = MemoryStore::new();
        store.create_dir("/inbox").await.unwrap();
        let service = service(&store);
        service.jump_absolute("/inbox").await.unwrap();

        let volume = MemoryStore::new().with_chunk_size(2);
        volume.put_file("/photos/a.txt", "hello").await.unwrap();
        volume.put_file("/photos/sub/b.txt", "world").await.unwrap();
        volume.put_file("/single.txt", "one").await.unwrap();
        let mut rx = service.subscribe();

        service
            .save(&volume, &paths(&["/photos", "/single.txt"]))
            .await
            .unwrap();

        assert_eq!(names(&service.snapshot()), vec!["photos", "single.txt"]);
        assert_eq!(
            store.read_range("/inbox/photos/sub/b.txt", 0, 64).await.unwrap(),
            b"world"
        );
        let events = drain(&mut rx);
        let last_progress = events.iter().rev().find_map(|e| match e {
            ServiceEvent::TransferProgress { name, percent, .. } if name == "a.txt" => Some(*percent),
            _ => None,
        });
        assert_eq!(last_progress, Some(100.0));
    }

    #[tokio::test]
    async fn copy_move_and_rename() {
        let store = MemoryStore::new();
        store.put_file("/src/a.txt", "a").await.unwrap();
        store.put_file("/src/dir/b.txt", "b").await.unwrap();
        store.create_dir("/dst").await.unwrap();
        let service = service(&store);

        service.copy(&paths(&["/src/dir"]), "/dst").await.unwrap();
        assert!(store.exists("/dst/dir/b.txt").await.unwrap());
        assert!(store.exists("/src/dir/b.txt").await.unwrap());

        service.move_to(&paths(&["/src/a.txt"]), "/dst").await.unwrap();
        assert!(store.exists("/dst/a.txt").await.unwrap());
        assert!(!store.exists("/src/a.txt").await.unwrap());

        service.rename("/dst/a.txt", "renamed.txt").await.unwrap();
        assert_eq!(store.read_range("/dst/renamed.txt", 0, 8).await.unwrap(), b"a");
        assert!(!store.exists("/dst/a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn transfer_rejects_bad_destinations() {
        let store = MemoryStore::new();
        store.put_file("/src/a.txt", "a").await.unwrap();
        store.put_file("/file", "f").await.unwrap();
        let service = service(&store);

        assert!(matches!(
            service.copy(&paths(&["/src"]), "/src/inner").await,
            Err(CoreError::InvalidPath(_))
        ));
        assert!(matches!(
            service.copy(&paths(&["/src/a.txt"]), "/src").await,
            Err(CoreError::AlreadyExists(_))
        ));
        assert!(matches!(
            service.move_to(&paths(&["/src/a.txt"]), "/file").await,
            Err(CoreError::NotADirectory(_))
        ));
        assert!(matches!(
            service.rename("/src/a.txt", "x/y").await,
            Err(CoreError::InvalidName(_))
        ));
        assert!(matches!(
            service.rename("/src/a.txt", "..").await,
            Err(CoreError::InvalidName(_))
        ));
        assert!(matches!(
            service.rename("/src", "file").await,
            Err(CoreError::AlreadyExists(p)) if p == "/file"
        ));
    }

    #[tokio::test]
    async fn reads_are_cached_until_structure_changes() {
        let store = MemoryStore::new();
        store.put_file("/note.txt", "v1").await.unwrap();
        let service = service(&store);

        assert_eq!(service.read_text("/note.txt").await.unwrap(), "v1");
        store.put_file("/note.txt", "v2").await.unwrap();
        assert_eq!(service.read_text("/note.txt").await.unwrap(), "v1");

        service.create_file("other.txt").await.unwrap();
        assert_eq!(service.read_text("/note.txt").await.unwrap(), "v1");

        service.remove(&paths(&["/other.txt"])).await.unwrap();
        assert_eq!(service.read_text("/note.txt").await.unwrap(), "v2");
    }

    #[tokio::test]
    async fn write_file_updates_store_and_cache() {
        let store = MemoryStore::new();
        store.create_dir("/docs").await.unwrap();
        let service = service(&store);

        service.write_file("/docs/new.md", b"# title".to_vec()).await.unwrap();

        assert_eq!(store.read_range("/docs/new.md", 0, 64).await.unwrap(), b"# title");
        assert_eq!(service.read_text("/docs/new.md").await.unwrap(), "# title");
        assert!(matches!(
            service.read_file("/docs").await,
            Err(CoreError::NotAFile(_))
        ));
    }

    #[tokio::test]
    async fn dispatch_reports_failures() {
        let store = MemoryStore::new();
        let service = service(&store);
        let mut rx = service.subscribe();

        let result = service
            .dispatch(Command::Rename("/missing".into(), "x".into()))
            .await;

        assert!(result.is_err());
        let failure = drain(&mut rx).into_iter().find_map(|e| match e {
            ServiceEvent::OperationFailed { operation, error } => Some((operation, error)),
            _ => None,
        });
        let (operation, error) = failure.unwrap();
        assert_eq!(operation, "rename");
        assert!(error.contains("/missing"));
    }

    #[tokio::test]
    async fn dispatch_runs_navigation() {
        let store = MemoryStore::new();
        store.create_dir("/a").await.unwrap();
        let service = service(&store);

        service.dispatch(Command::JumpRelative("a".into())).await.unwrap();
        service.dispatch(Command::Mkdir("b".into())).await.unwrap();
        service.dispatch(Command::GoUp).await.unwrap();

        assert_eq!(service.current_path(), "/");
        assert!(store.exists("/a/b").await.unwrap());
    }

    #[test]
    fn zero_cache_capacity_is_rejected() {
        let mut config = Config::default();
        config.explorer.content_cache_capacity = 0;
        let result = FileService::new(Arc::new(MemoryStore::new()), &config);
        assert!(matches!(result, Err(CoreError::InvalidCapacity(0))));
    }
}
