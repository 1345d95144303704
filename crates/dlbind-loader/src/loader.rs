//! Library and symbol loader abstraction.
//!
//! [`LibraryLoader`] opens libraries, [`LibraryHandle`] looks up symbols in an
//! open library and releases it. [`NativeLoader`] covers the POSIX `dl*`
//! family (including the BSD libc shim) and the Windows loader through
//! libloading.

use std::ffi::c_void;
use std::fmt;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;

use crate::error::{LoaderError, Result};
use crate::resolver::LibraryPathResolver;

/// Address of a resolved native symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolAddress(pub usize);

impl SymbolAddress {
    pub fn as_usize(self) -> usize {
        self.0
    }

    pub fn as_ptr(self) -> *const c_void {
        self.0 as *const c_void
    }
}

/// An open native library.
///
/// Object-safe so handles can be stored in `Box<dyn LibraryHandle>`.
pub trait LibraryHandle: fmt::Debug + Send + Sync {
    /// Name or path the handle was opened from.
    fn name(&self) -> &str;

    /// Look up a symbol by its exported name.
    fn symbol(&self, name: &str) -> Result<SymbolAddress>;

    /// Release the library. Closing twice is a no-op.
    fn close(&self) -> Result<()>;

    /// Whether [`close`](Self::close) has run.
    fn is_closed(&self) -> bool;
}

/// Opens native libraries.
pub trait LibraryLoader: fmt::Debug + Send + Sync {
    /// Open the library at `path`, or the running program for `None`.
    fn open(&self, path: Option<&Path>) -> Result<Box<dyn LibraryHandle>>;

    /// Resolve `library` with `resolver` and open the result.
    fn load(
        &self,
        library: &str,
        resolver: &LibraryPathResolver,
    ) -> Result<Box<dyn LibraryHandle>> {
        let path = resolver.resolve(library).into_result()?;
        self.open(path.as_deref())
    }
}

/// Loader backed by the operating system's dynamic linker.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeLoader;

impl NativeLoader {
    pub fn new() -> Self {
        Self
    }
}

impl LibraryLoader for NativeLoader {
    fn open(&self, path: Option<&Path>) -> Result<Box<dyn LibraryHandle>> {
        let name = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<main program>".to_string());

        platform::clear_error_state();
        let library = match path {
            Some(path) => platform::open_path(path),
            None => platform::open_self(),
        }
        .map_err(|e| LoaderError::LibraryLoading {
            library: name.clone(),
            detail: e.to_string(),
        })?;

        tracing::debug!(target: "dlbind::loader", library = name.as_str(), "opened native library");
        Ok(Box::new(NativeHandle {
            name,
            path: path.map(Path::to_path_buf),
            library: RwLock::new(Some(library)),
        }))
    }
}

/// Handle to a library opened by [`NativeLoader`].
pub struct NativeHandle {
    name: String,
    path: Option<PathBuf>,
    library: RwLock<Option<libloading::Library>>,
}

impl NativeHandle {
    /// Path the library was opened from (`None` for the main program).
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHandle")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl LibraryHandle for NativeHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, name: &str) -> Result<SymbolAddress> {
        let guard = self.library.read();
        let library = guard.as_ref().ok_or_else(|| LoaderError::Closed {
            library: self.name.clone(),
        })?;

        if name.as_bytes().contains(&0) {
            return Err(LoaderError::SymbolLoading {
                symbol: name.to_string(),
                detail: "symbol name contains a NUL byte".to_string(),
            });
        }
        let mut c_name = Vec::with_capacity(name.len() + 1);
        c_name.extend_from_slice(name.as_bytes());
        c_name.push(0);

        // SAFETY: the symbol is only read as an address, never called here.
        let symbol: libloading::Symbol<'_, *const c_void> = unsafe { library.get(&c_name) }
            .map_err(|e| LoaderError::SymbolLoading {
                symbol: name.to_string(),
                detail: e.to_string(),
            })?;

        let address = *symbol as usize;
        if address == 0 {
            return Err(LoaderError::SymbolLoading {
                symbol: name.to_string(),
                detail: "symbol resolved to a null address".to_string(),
            });
        }
        tracing::trace!(target: "dlbind::loader", symbol = name, address, "resolved symbol");
        Ok(SymbolAddress(address))
    }

    fn close(&self) -> Result<()> {
        let taken = self.library.write().take();
        if let Some(library) = taken {
            library.close().map_err(|e| LoaderError::LibraryLoading {
                library: self.name.clone(),
                detail: e.to_string(),
            })?;
            tracing::debug!(target: "dlbind::loader", library = self.name.as_str(), "closed native library");
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.library.read().is_none()
    }
}

#[cfg(unix)]
mod platform {
    use std::ffi::c_char;
    use std::path::Path;

    use libloading::os::unix::{Library, RTLD_LOCAL, RTLD_NOW};

    extern "C" {
        fn dlerror() -> *mut c_char;
    }

    /// Discard any error left over from an earlier `dl*` call.
    pub(super) fn clear_error_state() {
        // SAFETY: dlerror only reads and resets thread-local loader state.
        unsafe {
            dlerror();
        }
    }

    pub(super) fn open_path(path: &Path) -> Result<libloading::Library, libloading::Error> {
        // SAFETY: running library initializers is inherent to loading a library.
        unsafe { Library::open(Some(path), RTLD_NOW | RTLD_LOCAL) }.map(Into::into)
    }

    pub(super) fn open_self() -> Result<libloading::Library, libloading::Error> {
        Ok(Library::this().into())
    }
}

#[cfg(windows)]
mod platform {
    use std::path::Path;

    use libloading::os::windows::Library;

    #[link(name = "kernel32")]
    extern "system" {
        fn SetLastError(code: u32);
    }

    /// Discard any error left over from an earlier loader call.
    pub(super) fn clear_error_state() {
        // SAFETY: SetLastError only writes the calling thread's error slot.
        unsafe { SetLastError(0) }
    }

    pub(super) fn open_path(path: &Path) -> Result<libloading::Library, libloading::Error> {
        // SAFETY: running DllMain is inherent to loading a library.
        unsafe { Library::new(path) }.map(Into::into)
    }

    pub(super) fn open_self() -> Result<libloading::Library, libloading::Error> {
        Library::this().map(Into::into)
    }
}
