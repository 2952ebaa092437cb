//! Configuration management for opfsx.
//!
//! User preferences ([`settings::Config`]) are stored as a TOML file and
//! loaded at startup.

pub mod settings;

pub use settings::{Config, ExplorerConfig, LogConfig, StorageConfig, TransferConfig};
