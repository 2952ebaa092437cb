//! Revocable object URLs for listing thumbnails.
//!
//! A refresh creates one URL per image it lists and records them in the
//! [`NavigationState`](super::state::NavigationState) it produces. When that
//! state is superseded its URLs are revoked explicitly, so a URL never
//! outlives the listing that created it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use uuid::Uuid;

const URL_PREFIX: &str = "blob:opfsx/";

/// Bytes behind an object URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBlob {
    pub mime: String,
    pub data: Arc<Vec<u8>>,
}

/// Issues and resolves object URLs.
#[derive(Debug, Clone, Default)]
pub struct UrlRegistry {
    blobs: Arc<Mutex<HashMap<String, ObjectBlob>>>,
}

impl UrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `data` and returns a fresh URL for it. The MIME type is
    /// guessed from `file_name`.
    pub fn create(&self, file_name: &str, data: Vec<u8>) -> String {
        let mime = mime_guess::from_path(file_name)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        let url = format!("{URL_PREFIX}{}", Uuid::new_v4());
        self.lock().insert(
            url.clone(),
            ObjectBlob {
                mime,
                data: Arc::new(data),
            },
        );
        url
    }

    /// Looks up a live URL.
    pub fn resolve(&self, url: &str) -> Option<ObjectBlob> {
        self.lock().get(url).cloned()
    }

    /// Revokes one URL. Returns `false` if it was not live.
    pub fn revoke(&self, url: &str) -> bool {
        self.lock().remove(url).is_some()
    }

    /// Revokes every URL in `urls`.
    pub fn revoke_all(&self, urls: &[String]) {
        let mut blobs = self.lock();
        for url in urls {
            blobs.remove(url);
        }
    }

    /// Number of live URLs.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ObjectBlob>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
