//! The file service and the state it publishes.

pub mod file_service;
pub mod object_url;
pub mod state;
pub mod usage;

pub use file_service::FileService;
pub use object_url::{ObjectBlob, UrlRegistry};
pub use state::NavigationState;
pub use usage::{format_bytes, UsageSnapshot};
