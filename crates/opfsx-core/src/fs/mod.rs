//! Store-facing building blocks for the explorer.
//!
//! [`path`] is the pure path algebra, [`store`] the abstract host store with
//! its [`memory`] and [`disk`] backends, [`stream`] the chunked byte pipe,
//! [`pool`] the pooled-container header decoder, and [`entry`] the listing
//! record the file service hands to the UI.

pub mod disk;
pub mod entry;
pub mod memory;
pub mod path;
pub mod pool;
pub mod store;
pub mod stream;

pub use disk::DiskStore;
pub use entry::{sort_entries, DirectoryEntry, EntryKind};
pub use memory::MemoryStore;
pub use pool::PoolName;
pub use store::{
    DirectoryPicker, FixedPicker, HandleKind, PickedDirectory, StorageEstimate, Store, StoreHandle,
};
pub use stream::{pipe, ByteSink, ByteSource, PipeOptions, Progress};
