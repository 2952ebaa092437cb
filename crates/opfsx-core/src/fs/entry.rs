//! Directory entry representation.

use serde::Serialize;
use unicode_normalization::UnicodeNormalization;

use crate::fs::store::{HandleKind, StoreHandle};

/// What a listed entry is, as far as the explorer is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EntryKind {
    Directory,
    File,
    /// A pooled-container file whose header was recognized.
    PoolFile,
}

impl From<HandleKind> for EntryKind {
    fn from(kind: HandleKind) -> Self {
        match kind {
            HandleKind::Directory => Self::Directory,
            HandleKind::File => Self::File,
        }
    }
}

/// A single entry of a directory listing.
///
/// `name` is the NFC display name. Store operations go through `path` and
/// `handle.name`, which keep the name exactly as the store reported it.
///
/// Entries start out as [`EntryKind::Directory`] or [`EntryKind::File`];
/// a refresh promotes recognized pooled containers to
/// [`EntryKind::PoolFile`] and records the recovered name in `subname`.
/// `url` is only set for image files and stays valid until the listing
/// that created it is replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub handle: StoreHandle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subname: Option<String>,
}

impl DirectoryEntry {
    /// Builds an unannotated entry for `handle` living at `path`.
    pub fn new(path: String, handle: StoreHandle) -> Self {
        Self {
            name: handle.name.nfc().collect(),
            path,
            kind: handle.kind.into(),
            handle,
            url: None,
            subname: None,
        }
    }

    /// Returns `true` if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// File size in bytes. Always `0` for directories.
    pub fn size(&self) -> u64 {
        self.handle.size
    }
}

/// Sorts entries directories-first, then by name using an ordinal,
/// case-sensitive comparison.
pub fn sort_entries(entries: &mut [DirectoryEntry]) {
    entries.sort_by(|a, b| {
        b.is_dir()
            .cmp(&a.is_dir())
            .then_with(|| a.name.cmp(&b.name))
    });
}
