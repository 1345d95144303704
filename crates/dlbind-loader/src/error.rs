//! Loader error types.

use dlbind_targets::TargetError;

/// Errors that can occur while resolving, opening, or querying a library.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// The library could not be found in any search location.
    #[error("library not found: {library}: {reason}")]
    LibraryNotFound { library: String, reason: String },

    /// The platform loader refused to open the library.
    #[error("failed to load library {library}: {detail}")]
    LibraryLoading { library: String, detail: String },

    /// A symbol could not be found in an open library.
    #[error("failed to load symbol {symbol}: {detail}")]
    SymbolLoading { symbol: String, detail: String },

    /// The handle was used after being closed.
    #[error("library handle is closed: {library}")]
    Closed { library: String },

    /// Platform detection failed.
    #[error("platform error: {0}")]
    Target(#[from] TargetError),

    /// I/O error while probing the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;
