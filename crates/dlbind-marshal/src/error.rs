//! Marshalling error types.

use dlbind_core::ContractError;

/// Errors that can occur while converting values or calling native code.
#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    /// No transformer or native representation exists for a type.
    #[error("unsupported type: {ty}")]
    UnsupportedType { ty: String },

    /// The call cannot be made on this platform.
    #[error("platform not supported: {detail}")]
    PlatformNotSupported { detail: String },

    /// More than one mangler applies to a symbol.
    #[error("ambiguous mangler for {symbol}: {detail}")]
    AmbiguousMangler { symbol: String, detail: String },

    /// A mangled name could not be reversed.
    #[error("cannot demangle {symbol}: {detail}")]
    Demangle { symbol: String, detail: String },

    /// An argument does not match its declared native type.
    #[error("argument mismatch: {detail}")]
    ArgumentMismatch { detail: String },

    /// A native allocation failed.
    #[error("failed to allocate {size} bytes of native memory")]
    Allocation { size: usize },

    /// Native data could not be decoded.
    #[error("invalid native data: {detail}")]
    InvalidData { detail: String },

    /// Contract-level error (type mismatch, bad declaration).
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),
}

impl MarshalError {
    pub(crate) fn unsupported(ty: impl std::fmt::Display) -> Self {
        Self::UnsupportedType { ty: ty.to_string() }
    }
}

/// Result type alias for marshalling operations.
pub type Result<T> = std::result::Result<T, MarshalError>;
