//! Resolution result value.

use std::path::{Path, PathBuf};

use crate::error::{LoaderError, Result};

/// Outcome of resolving a library name to a loadable path.
///
/// `Found { path: None }` means "the process's own symbol table" and is
/// distinct from `NotFound`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvePathResult {
    /// The library was located.
    Found { path: Option<PathBuf> },
    /// No search location held the library.
    NotFound { library: String, reason: String },
}

impl ResolvePathResult {
    /// Successful resolution to a file on disk.
    pub fn found(path: impl Into<PathBuf>) -> Self {
        Self::Found {
            path: Some(path.into()),
        }
    }

    /// Successful resolution to the running program itself.
    pub fn main_program() -> Self {
        Self::Found { path: None }
    }

    /// Failed resolution.
    pub fn not_found(library: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::NotFound {
            library: library.into(),
            reason: reason.into(),
        }
    }

    /// Whether the library was located.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    /// The resolved path, if resolution succeeded with a file.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Found { path } => path.as_deref(),
            Self::NotFound { .. } => None,
        }
    }

    /// Convert into a `Result`, turning `NotFound` into `LibraryNotFound`.
    pub fn into_result(self) -> Result<Option<PathBuf>> {
        match self {
            Self::Found { path } => Ok(path),
            Self::NotFound { library, reason } => {
                Err(LoaderError::LibraryNotFound { library, reason })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_program_is_success_without_path() {
        let result = ResolvePathResult::main_program();
        assert!(result.is_success());
        assert!(result.path().is_none());
        assert_eq!(result.into_result().unwrap(), None);
    }

    #[test]
    fn not_found_names_library() {
        let result = ResolvePathResult::not_found("libfoo", "nowhere");
        assert!(!result.is_success());
        let err = result.into_result().unwrap_err();
        assert!(err.to_string().contains("libfoo"));
    }
}
