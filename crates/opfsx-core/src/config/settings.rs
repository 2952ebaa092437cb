//! Application configuration loaded from a TOML file.
//!
//! The default configuration matches the values shown in `config/default.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Top-level application configuration.
///
/// All fields have sensible defaults so opfsx works without a config file.
/// Call [`Config::load`] to read from a TOML path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub transfer: TransferConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Config {
    /// Loads configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the file does not exist.
    /// - [`CoreError::ConfigParse`] if the TOML is malformed.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CoreError::NotFound(path.display().to_string()),
            _ => CoreError::Io(e),
        })?;
        toml::from_str(&content).map_err(|e| CoreError::ConfigParse(e.to_string()))
    }
}

/// Listing behaviour of the file service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    /// Name of the directory holding pooled-container files.
    #[serde(default = "default_pool_dir_name")]
    pub pool_dir_name: String,
    /// Extensions (with leading dot) that get an object URL during refresh.
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
    #[serde(default = "default_content_cache_capacity")]
    pub content_cache_capacity: usize,
}

impl ExplorerConfig {
    /// Returns `true` if `ext` (as produced by `extname`) is an image extension.
    pub fn is_image_extension(&self, ext: &str) -> bool {
        !ext.is_empty()
            && self
                .image_extensions
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            pool_dir_name: default_pool_dir_name(),
            image_extensions: default_image_extensions(),
            content_cache_capacity: default_content_cache_capacity(),
        }
    }
}

/// Chunking of streamed transfers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// On-disk location emulating the private store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
    #[serde(default = "default_quota_bytes")]
    pub quota_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            quota_bytes: default_quota_bytes(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_file")]
    pub file: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

fn default_pool_dir_name() -> String {
    ".opaque".to_string()
}

fn default_image_extensions() -> Vec<String> {
    [".png", ".jpg", ".jpeg"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_content_cache_capacity() -> usize {
    crate::cache::DEFAULT_CAPACITY
}

fn default_chunk_size() -> usize {
    crate::fs::stream::DEFAULT_CHUNK_SIZE
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("./opfs")
}

fn default_quota_bytes() -> u64 {
    10 * 1024 * 1024 * 1024
}

fn default_log_file() -> PathBuf {
    PathBuf::from("/tmp/opfsx.log")
}
