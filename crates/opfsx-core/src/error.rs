//! Error types for `opfsx-core`.
//!
//! All fallible operations in the core library return [`CoreResult<T>`],
//! which is an alias for `Result<T, CoreError>`.

/// Unified error type for all core operations.
///
/// Validation variants are raised before any store call is made, so a
/// rejected operation never leaves a half-applied mutation behind.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The target path does not exist in the store.
    #[error("path not found: {0}")]
    NotFound(String),

    /// A file creation collided with an existing entry.
    #[error("file already exists: {0}")]
    AlreadyExists(String),

    /// The path does not normalize to a root-prefixed absolute path.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A file or directory name is invalid (empty, contains path separators, etc.).
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A cache was constructed with a zero capacity.
    #[error("invalid cache capacity: {0} (must be greater than 0)")]
    InvalidCapacity(usize),

    /// A directory was expected but the path points to a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file was expected but the path points to a directory.
    #[error("not a file: {0}")]
    NotAFile(String),

    /// Failed to parse a TOML configuration file.
    #[error("config parse error: {0}")]
    ConfigParse(String),

    /// The user cancelled an interactive operation, or a transfer was aborted.
    #[error("operation cancelled")]
    Cancelled,

    /// A bounded transfer ran out of source bytes before its budget was spent.
    #[error("stream stopped prematurely: wrote {written} of {expected} bytes")]
    StoppedPrematurely {
        /// Bytes the caller asked for.
        expected: u64,
        /// Bytes actually written before the source ended.
        written: u64,
    },

    /// An I/O error that doesn't fit a more specific variant.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout `opfsx-core`.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_displays_path() {
        let err = CoreError::NotFound("/missing/file".to_string());
        assert_eq!(err.to_string(), "path not found: /missing/file");
    }

    #[test]
    fn already_exists_displays_path() {
        let err = CoreError::AlreadyExists("/notes.txt".to_string());
        assert_eq!(err.to_string(), "file already exists: /notes.txt");
    }

    #[test]
    fn invalid_path_displays_path() {
        let err = CoreError::InvalidPath("relative/dir".to_string());
        assert_eq!(err.to_string(), "invalid path: relative/dir");
    }

    #[test]
    fn invalid_capacity_displays_value() {
        let err = CoreError::InvalidCapacity(0);
        assert_eq!(
            err.to_string(),
            "invalid cache capacity: 0 (must be greater than 0)"
        );
    }

    #[test]
    fn stopped_prematurely_displays_counts() {
        let err = CoreError::StoppedPrematurely {
            expected: 500,
            written: 120,
        };
        assert_eq!(
            err.to_string(),
            "stream stopped prematurely: wrote 120 of 500 bytes"
        );
    }

    #[test]
    fn cancelled_displays_message() {
        assert_eq!(CoreError::Cancelled.to_string(), "operation cancelled");
    }

    #[test]
    fn io_error_from_std() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let core_err: CoreError = io_err.into();
        assert!(matches!(core_err, CoreError::Io(_)));
        assert!(core_err.to_string().contains("gone"));
    }

    #[test]
    fn core_result_err() {
        let result: CoreResult<i32> = Err(CoreError::Cancelled);
        assert!(result.is_err());
    }
}
