//! opfsx core library: UI-agnostic explorer logic for a sandboxed byte store.
//!
//! `opfsx-core` provides the types and operations for browsing and managing
//! a private hierarchical store. It is decoupled from any frontend so the
//! CLI (`opfsx-cli`) and other hosts drive the same logic.
//!
//! # Modules
//!
//! - [`fs`] — Store abstractions: path algebra, the [`Store`] trait with memory and disk backends, the chunked stream pipe, and the pool header decoder.
//! - [`cache`] — The [`ByteCache`] LRU used for file contents.
//! - [`service`] — The [`FileService`], its [`NavigationState`] snapshots, usage reporting and object URLs.
//! - [`app`] — The [`ApplicationRegistry`] that maps extensions to handlers.
//! - [`config`] — User-facing configuration (TOML-based settings).
//! - [`event`] — Command and event types for UI ↔ Core communication.
//! - [`error`] — Unified error type ([`CoreError`]) and result alias ([`CoreResult`]).

pub mod app;
pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod fs;
pub mod service;

pub use app::{language_for, AppKind, Application, ApplicationInstance, ApplicationRegistry};
pub use cache::ByteCache;
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use event::{Command, ServiceEvent};
pub use fs::{
    DirectoryEntry, DirectoryPicker, DiskStore, EntryKind, FixedPicker, MemoryStore,
    PickedDirectory, PoolName, Store, StoreHandle,
};
pub use service::{FileService, NavigationState, UsageSnapshot};
