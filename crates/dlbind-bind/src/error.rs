//! Binding error types.

use dlbind_core::ContractError;
use dlbind_dllmap::DllMapError;
use dlbind_loader::LoaderError;
use dlbind_marshal::MarshalError;
use dlbind_targets::TargetError;

/// Errors that can occur while binding a contract or calling a bound member.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    /// The library could not be found or opened.
    #[error("failed to load library {library}: {detail}")]
    LibraryLoading { library: String, detail: String },

    /// A member's native symbol could not be resolved.
    #[error("failed to load symbol {symbol} for member {member}: {detail}")]
    SymbolLoading {
        member: String,
        symbol: String,
        detail: String,
    },

    /// No property with this name exists on the contract.
    #[error("no property named {name}")]
    FieldNotFound { name: String },

    /// No method with this name exists on the contract.
    #[error("no method named {name}")]
    MethodNotFound { name: String },

    /// More than one mangler applies to a member.
    #[error("ambiguous mangler for {symbol}: {detail}")]
    AmbiguousMangler { symbol: String, detail: String },

    /// A type has no native representation or transformer.
    #[error("unsupported type: {ty}")]
    UnsupportedType { ty: String },

    /// The operation cannot be performed on this platform.
    #[error("platform not supported: {detail}")]
    PlatformNotSupported { detail: String },

    /// A guarded member was called after the instance was disposed.
    #[error("{member} called on a disposed library instance")]
    Disposed { member: String },

    /// Arguments do not match the member's declaration.
    #[error("argument mismatch for {member}: {detail}")]
    ArgumentMismatch { member: String, detail: String },

    /// The binding machinery reached a state it should never reach.
    #[error("internal consistency error: {detail}")]
    InternalConsistency { detail: String },

    /// Marshalling error without a more specific classification.
    #[error("marshalling error: {0}")]
    Marshal(MarshalError),

    /// Contract validation error.
    #[error("contract error: {0}")]
    Contract(#[from] ContractError),

    /// Dllmap configuration error.
    #[error("dllmap error: {0}")]
    DllMap(#[from] DllMapError),

    /// Loader error without a more specific classification.
    #[error("loader error: {0}")]
    Loader(LoaderError),

    /// Platform detection failed.
    #[error("platform error: {0}")]
    Target(#[from] TargetError),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BindError {
    /// Attach a member name to a symbol lookup failure.
    pub(crate) fn symbol(member: &str, symbol: &str, err: LoaderError) -> Self {
        Self::SymbolLoading {
            member: member.to_string(),
            symbol: symbol.to_string(),
            detail: err.to_string(),
        }
    }

    pub(crate) fn mismatch(member: &str, detail: impl Into<String>) -> Self {
        Self::ArgumentMismatch {
            member: member.to_string(),
            detail: detail.into(),
        }
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::InternalConsistency {
            detail: detail.into(),
        }
    }
}

impl From<LoaderError> for BindError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::LibraryNotFound { library, reason } => Self::LibraryLoading {
                library,
                detail: reason,
            },
            LoaderError::LibraryLoading { library, detail } => {
                Self::LibraryLoading { library, detail }
            }
            LoaderError::SymbolLoading { symbol, detail } => Self::SymbolLoading {
                member: String::new(),
                symbol,
                detail,
            },
            LoaderError::Target(err) => Self::Target(err),
            other => Self::Loader(other),
        }
    }
}

impl From<MarshalError> for BindError {
    fn from(err: MarshalError) -> Self {
        match err {
            MarshalError::UnsupportedType { ty } => Self::UnsupportedType { ty },
            MarshalError::PlatformNotSupported { detail } => Self::PlatformNotSupported { detail },
            MarshalError::AmbiguousMangler { symbol, detail } => {
                Self::AmbiguousMangler { symbol, detail }
            }
            MarshalError::ArgumentMismatch { detail } => Self::ArgumentMismatch {
                member: String::new(),
                detail,
            },
            MarshalError::Contract(err) => Self::Contract(err),
            other => Self::Marshal(other),
        }
    }
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, BindError>;
