//! Event system for communication between UI and Core.
//!
//! The UI translates user input into [`Command`]s, which the file service
//! processes and answers with [`ServiceEvent`]s on a broadcast channel. Any
//! number of frontends can subscribe to the same service.

use std::sync::Arc;

use crate::service::state::NavigationState;

/// An action the UI requests the core to perform.
///
/// Commands flow **UI → Core**. The core never creates commands itself.
/// Paths are store paths; names are single path components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Re-read the current directory.
    Refresh,
    /// Navigate relative to the current directory (`".."` goes up).
    JumpRelative(String),
    /// Navigate to an absolute path.
    JumpAbsolute(String),
    /// Move to the parent directory.
    GoUp,
    /// Create a directory in the current directory.
    Mkdir(String),
    /// Create an empty file in the current directory.
    CreateFile(String),
    /// Delete the listed entries.
    Remove(Vec<String>),
    /// Copy the listed entries into the destination directory.
    Copy(Vec<String>, String),
    /// Move the listed entries into the destination directory.
    Move(Vec<String>, String),
    /// Rename an entry in place.
    Rename(String, String),
}

impl Command {
    /// Short operation label used in [`ServiceEvent::OperationFailed`].
    pub fn label(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::JumpRelative(_) | Self::JumpAbsolute(_) | Self::GoUp => "navigate",
            Self::Mkdir(_) => "mkdir",
            Self::CreateFile(_) => "create file",
            Self::Remove(_) => "remove",
            Self::Copy(..) => "copy",
            Self::Move(..) => "move",
            Self::Rename(..) => "rename",
        }
    }
}

/// A notification the core sends back to the UI.
///
/// Events flow **Core → UI**. The UI uses these to update its display state.
#[derive(Debug, Clone)]
pub enum ServiceEvent {
    /// A refresh started (`true`) or finished (`false`).
    Refreshing(bool),
    /// A refresh published a new snapshot.
    EntriesChanged(Arc<NavigationState>),
    /// A chunk of an import or export was written.
    TransferProgress {
        /// File name shown to the user.
        name: String,
        /// Destination path of the transfer.
        path: String,
        loaded: u64,
        percent: f64,
        total: u64,
    },
    /// A single file transfer completed.
    TransferDone { name: String, path: String },
    /// An operation failed.
    OperationFailed {
        /// Human-readable description of the operation.
        operation: String,
        /// The error message.
        error: String,
    },
}
