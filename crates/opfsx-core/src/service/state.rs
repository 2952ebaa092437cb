//! The observable navigation snapshot.

use serde::Serialize;

use crate::fs::entry::DirectoryEntry;
use crate::fs::path::ROOT_DIR;
use crate::service::usage::UsageSnapshot;

/// One complete listing, published by a refresh.
///
/// A snapshot is immutable once published; the next refresh replaces it
/// wholesale and revokes the object URLs recorded in `object_urls`.
#[derive(Debug, Clone, Serialize)]
pub struct NavigationState {
    pub current_path: String,
    pub current_items: Vec<DirectoryEntry>,
    pub usage: UsageSnapshot,
    #[serde(skip)]
    pub(crate) object_urls: Vec<String>,
}

impl NavigationState {
    /// The empty state at the root, before the first refresh.
    pub fn initial() -> Self {
        Self {
            current_path: ROOT_DIR.to_string(),
            current_items: Vec::new(),
            usage: UsageSnapshot::default(),
            object_urls: Vec::new(),
        }
    }

    /// Object URLs owned by this snapshot.
    pub fn object_urls(&self) -> &[String] {
        &self.object_urls
    }

    /// Finds a listed entry by name.
    pub fn item(&self, name: &str) -> Option<&DirectoryEntry> {
        self.current_items.iter().find(|entry| entry.name == name)
    }
}

impl Default for NavigationState {
    fn default() -> Self {
        Self::initial()
    }
}
