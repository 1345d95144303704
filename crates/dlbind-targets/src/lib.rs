//! Host platform model for dlbind.
//!
//! A platform is the triple that decides how a native library is found and
//! how its symbols are named:
//! - **Operating system:** loader family, library file naming, search order
//! - **Architecture:** calling convention family, arch-specific subfolders
//! - **Word size:** pointer width used for symbol decoration and layout
//!
//! [`Platform::current`] detects the triple for the running process.

pub mod arch;
pub mod error;
pub mod os;
pub mod platform;

pub use arch::Architecture;
pub use error::{Result, TargetError};
pub use os::{LoaderFamily, OperatingSystem};
pub use platform::{Platform, WordSize};
