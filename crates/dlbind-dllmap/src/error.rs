//! Dllmap error types.

/// Errors that can occur while reading or applying a dllmap configuration.
#[derive(Debug, thiserror::Error)]
pub enum DllMapError {
    /// Malformed XML.
    #[error("invalid XML at line {line}: {detail}")]
    Xml { line: usize, detail: String },

    /// Well-formed document that is not a valid dllmap configuration.
    #[error("invalid dllmap configuration: {detail}")]
    InvalidConfiguration { detail: String },

    /// A mapping matched but names no target library.
    #[error("the library {library} had a mapping, but the mapping lacked a target library")]
    MissingTarget { library: String },

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for dllmap operations.
pub type Result<T> = std::result::Result<T, DllMapError>;
