//! In-process symbol tables exposed through the loader traits.
//!
//! Lets functions compiled into the running program stand in for a native
//! library: each registered library is a name-to-address table, and
//! [`StaticLoader::load`] opens it by name without touching the filesystem.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{LoaderError, Result};
use crate::loader::{LibraryHandle, LibraryLoader, SymbolAddress};
use crate::resolver::{LibraryPathResolver, INTERNAL_LIBRARY};

#[derive(Debug, Default)]
struct SymbolTable {
    symbols: RwLock<HashMap<String, usize>>,
    open_handles: AtomicUsize,
}

/// Loader over registered in-process symbol tables.
#[derive(Debug, Default, Clone)]
pub struct StaticLoader {
    libraries: Arc<RwLock<HashMap<String, Arc<SymbolTable>>>>,
}

impl StaticLoader {
    /// Create a loader with no libraries.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library and its symbols.
    pub fn with_library<I, S>(self, library: &str, symbols: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        for (symbol, address) in symbols {
            self.insert_symbol(library, symbol, address);
        }
        self
    }

    /// Add or replace one symbol of a library, registering the library if needed.
    pub fn insert_symbol(&self, library: &str, symbol: impl Into<String>, address: usize) {
        let table = self
            .libraries
            .write()
            .entry(library.to_string())
            .or_default()
            .clone();
        table.symbols.write().insert(symbol.into(), address);
    }

    /// Number of handles to `library` that are open right now.
    pub fn open_handles(&self, library: &str) -> usize {
        self.libraries
            .read()
            .get(library)
            .map(|t| t.open_handles.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    fn open_table(&self, library: &str) -> Result<Box<dyn LibraryHandle>> {
        let table = self
            .libraries
            .read()
            .get(library)
            .cloned()
            .ok_or_else(|| LoaderError::LibraryLoading {
                library: library.to_string(),
                detail: "no in-process library registered under this name".to_string(),
            })?;
        table.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticHandle {
            name: library.to_string(),
            table,
            closed: AtomicBool::new(false),
        }))
    }
}

impl LibraryLoader for StaticLoader {
    fn open(&self, path: Option<&Path>) -> Result<Box<dyn LibraryHandle>> {
        match path {
            None => self.open_table(INTERNAL_LIBRARY),
            Some(path) => {
                let name = path
                    .file_name()
                    .map(|f| f.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                self.open_table(&name)
            }
        }
    }

    fn load(
        &self,
        library: &str,
        _resolver: &LibraryPathResolver,
    ) -> Result<Box<dyn LibraryHandle>> {
        self.open_table(library)
    }
}

#[derive(Debug)]
struct StaticHandle {
    name: String,
    table: Arc<SymbolTable>,
    closed: AtomicBool,
}

impl LibraryHandle for StaticHandle {
    fn name(&self) -> &str {
        &self.name
    }

    fn symbol(&self, name: &str) -> Result<SymbolAddress> {
        if self.is_closed() {
            return Err(LoaderError::Closed {
                library: self.name.clone(),
            });
        }
        self.table
            .symbols
            .read()
            .get(name)
            .copied()
            .map(SymbolAddress)
            .ok_or_else(|| LoaderError::SymbolLoading {
                symbol: name.to_string(),
                detail: format!("not exported by {}", self.name),
            })
    }

    fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.table.open_handles.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for StaticHandle {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlbind_targets::Platform;
    use crate::context::SearchContext;

    fn resolver() -> LibraryPathResolver {
        LibraryPathResolver::new(Platform::linux_x86_64(), SearchContext::empty())
    }

    #[test]
    fn load_by_name_and_lookup() {
        let loader = StaticLoader::new().with_library("libdemo", [("answer", 0x42usize)]);
        let handle = loader.load("libdemo", &resolver()).unwrap();
        assert_eq!(handle.symbol("answer").unwrap(), SymbolAddress(0x42));
        assert!(matches!(
            handle.symbol("question"),
            Err(LoaderError::SymbolLoading { .. })
        ));
    }

    #[test]
    fn unknown_library_fails_to_load() {
        let loader = StaticLoader::new();
        assert!(matches!(
            loader.load("libnope", &resolver()),
            Err(LoaderError::LibraryLoading { .. })
        ));
    }

    #[test]
    fn open_handle_count_tracks_close_and_drop() {
        let loader = StaticLoader::new().with_library("libdemo", [("f", 1usize)]);
        let a = loader.load("libdemo", &resolver()).unwrap();
        let b = loader.load("libdemo", &resolver()).unwrap();
        assert_eq!(loader.open_handles("libdemo"), 2);

        a.close().unwrap();
        a.close().unwrap();
        assert_eq!(loader.open_handles("libdemo"), 1);

        drop(b);
        assert_eq!(loader.open_handles("libdemo"), 0);
    }

    #[test]
    fn main_program_table() {
        let loader = StaticLoader::new().with_library(INTERNAL_LIBRARY, [("main_sym", 7usize)]);
        let handle = loader.open(None).unwrap();
        assert_eq!(handle.symbol("main_sym").unwrap().as_usize(), 7);
    }
}
