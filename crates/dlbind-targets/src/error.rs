//! Error types for platform detection.

/// Errors that can occur while describing or detecting a platform.
#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    /// No detection rule matched the running process.
    #[error("platform not supported: {detail}")]
    PlatformNotSupported {
        /// What could not be detected.
        detail: String,
    },

    /// A platform component name could not be parsed.
    #[error("unknown {component}: {value}")]
    UnknownComponent {
        /// Which component was being parsed ("operating system", ...).
        component: &'static str,
        /// The rejected input.
        value: String,
    },
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, TargetError>;
