//! Legacy dllmap redirection for dlbind.
//!
//! A dllmap configuration renames requested libraries (and individual
//! symbols inside them) depending on the operating system, architecture,
//! and word size of the running process.
//!
//! ```xml
//! <configuration>
//!   <dllmap dll="cygwin1.dll" target="libc.so.6" os="!windows">
//!     <dllentry dll="libm.so.6" name="sinf" target="sin_single"/>
//!   </dllmap>
//! </configuration>
//! ```
//!
//! ## Modules
//!
//! - [`constraint`] — OS / CPU / word-size constraint sets and their parser
//! - [`xml`] — Minimal XML element reader for config files
//! - [`config`] — Configuration model, XML and TOML loading
//! - [`resolver`] — Library and symbol name mapping

pub mod config;
pub mod constraint;
pub mod error;
pub mod resolver;
pub mod xml;

pub use config::{Constrained, DllConfiguration, DllEntry, DllMap};
pub use constraint::{ArchSet, OsSet, WordSizeSet};
pub use error::{DllMapError, Result};
pub use resolver::{DllMapResolver, SymbolRedirect};
