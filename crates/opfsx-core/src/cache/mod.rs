//! In-memory caches.

pub mod lru;

pub use lru::{ByteCache, CacheEntry, DEFAULT_CAPACITY};
