//! Native library path resolution and symbol loading for dlbind.
//!
//! ## Modules
//!
//! - [`result`] — Explicit success/failure value for path resolution
//! - [`context`] — Snapshot of the environment consulted during a search
//! - [`search`] — Per-OS search strategies (probing, local, Linux/BSD, macOS, Windows)
//! - [`resolver`] — Candidate generation and the full resolution order
//! - [`loader`] — Library/symbol loader traits and the libloading-backed loader
//! - [`static_loader`] — In-process symbol tables exposed through the loader traits

pub mod context;
pub mod error;
pub mod loader;
pub mod resolver;
pub mod result;
pub mod search;
pub mod static_loader;

pub use context::SearchContext;
pub use error::{LoaderError, Result};
pub use loader::{LibraryHandle, LibraryLoader, NativeLoader, SymbolAddress};
pub use resolver::{LibraryPathResolver, INTERNAL_LIBRARY};
pub use result::ResolvePathResult;
pub use static_loader::StaticLoader;
