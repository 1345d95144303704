//! Contract error types.

/// Errors that can occur while building or validating a contract.
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// Two declarations share a closed signature with no explicit entry point.
    #[error("duplicate signature in contract {contract}: {signature}")]
    DuplicateSignature { contract: String, signature: String },

    /// A declaration is internally inconsistent.
    #[error("invalid declaration {member}: {detail}")]
    InvalidDeclaration { member: String, detail: String },

    /// A value could not be converted to the requested type.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    /// Serialization error while hashing.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for contract operations.
pub type Result<T> = std::result::Result<T, ContractError>;
