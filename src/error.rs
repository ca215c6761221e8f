//! Error types for ledger-import
//!
//! Every stage of an import run reports failures through [`Error`]. All
//! variants are terminal for the current run: nothing is retried internally,
//! and the workspace is still cleaned up before the error reaches the caller.
//! Callers decide about retries with [`IsRetryable`] and can surface
//! [`Error::error_code`] to their operators.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for ledger-import operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for ledger-import
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing input (request or importer configuration)
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "url")
        key: Option<String>,
    },

    /// Workspace creation or removal failed
    #[error("filesystem error at {path}: {source}")]
    Filesystem {
        /// Directory or file the operation was applied to
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Network-level failure while fetching (connect, DNS, timeout, broken body)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered 404
    #[error("source archive not found at {url}")]
    NotFound {
        /// URL that was requested
        url: String,
    },

    /// The server answered with a status the importer does not handle
    #[error("unexpected HTTP status {status} {message}")]
    UnknownFetch {
        /// HTTP status code
        status: u16,
        /// Status reason phrase
        message: String,
    },

    /// The archive is missing, corrupt, incomplete or could not be unpacked
    #[error("extraction failed for {archive}: {reason}")]
    Extraction {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// A data row could not be turned into events
    #[error("malformed row {row} in {file}: {reason}")]
    RowParse {
        /// File name inside the archive (e.g., "SK.csv")
        file: String,
        /// 1-based line number in the file (the header is line 1)
        row: u64,
        /// What was wrong with the row
        reason: String,
    },

    /// I/O error while writing the downloaded archive
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The run was cancelled through its cancellation token
    #[error("import cancelled")]
    Cancelled,

    /// The event consumer went away before the run finished
    #[error("event consumer dropped the stream")]
    ConsumerGone,
}

impl Error {
    /// Shorthand for a [`Error::Config`] naming the offending key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code for operator-facing layers
    pub fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Filesystem { .. } => "filesystem_error",
            Error::Transport(_) => "transport_error",
            Error::NotFound { .. } => "not_found",
            Error::UnknownFetch { .. } => "unknown_fetch_error",
            Error::Extraction { .. } => "extraction_error",
            Error::RowParse { .. } => "row_parse_error",
            Error::Io(_) => "io_error",
            Error::Cancelled => "cancelled",
            Error::ConsumerGone => "consumer_gone",
        }
    }
}

/// Trait for errors that can be classified as retryable or not
///
/// The importer itself never retries. This classification is for callers
/// that schedule runs and want to back off on transient failures only.
pub trait IsRetryable {
    /// Returns true if the error is transient and the run may be retried later
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for Error {
    fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            // 5xx, 429 and friends are usually temporary
            Error::UnknownFetch { .. } => true,
            Error::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::WouldBlock
            ),
            Error::Config { .. }
            | Error::Filesystem { .. }
            | Error::NotFound { .. }
            | Error::Extraction { .. }
            | Error::RowParse { .. }
            | Error::Cancelled
            | Error::ConsumerGone => false,
        }
    }
}
