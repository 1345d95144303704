//! Library handles owned by one bound instance.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dlbind_core::Callback;
use dlbind_loader::{LibraryHandle, LibraryLoader, LibraryPathResolver, SymbolAddress};
use parking_lot::Mutex;

use crate::error::Result;
use crate::unit::SymbolTarget;

/// The primary library of an instance plus any library a symbol redirection
/// points at.
///
/// Handles are opened once and closed together, on disposal or drop.
/// Callbacks passed with a persistent lifetime are held here and released
/// at the same time.
pub struct LibraryState {
    library: String,
    primary: Box<dyn LibraryHandle>,
    secondary: Mutex<HashMap<String, Box<dyn LibraryHandle>>>,
    loader: Arc<dyn LibraryLoader>,
    resolver: Arc<LibraryPathResolver>,
    callbacks: Mutex<Vec<Callback>>,
    disposed: AtomicBool,
}

impl LibraryState {
    /// Open `library` through `loader`.
    pub fn open(
        library: &str,
        loader: Arc<dyn LibraryLoader>,
        resolver: Arc<LibraryPathResolver>,
    ) -> Result<Self> {
        let primary = loader.load(library, &resolver)?;
        tracing::debug!(target: "dlbind::bind", library, handle = primary.name(), "opened primary library");
        Ok(Self {
            library: library.to_string(),
            primary,
            secondary: Mutex::new(HashMap::new()),
            loader,
            resolver,
            callbacks: Mutex::new(Vec::new()),
            disposed: AtomicBool::new(false),
        })
    }

    /// Library name the instance was bound to, after dllmap mapping.
    pub fn library(&self) -> &str {
        &self.library
    }

    pub fn loader(&self) -> &Arc<dyn LibraryLoader> {
        &self.loader
    }

    pub fn resolver(&self) -> &Arc<LibraryPathResolver> {
        &self.resolver
    }

    /// Address of `target`, opening its library first if it is not the
    /// primary one.
    pub fn resolve(&self, target: &SymbolTarget) -> dlbind_loader::Result<SymbolAddress> {
        match target.library.as_deref() {
            None => self.primary.symbol(&target.name),
            Some(library) if library == self.library => self.primary.symbol(&target.name),
            Some(library) => {
                let mut secondary = self.secondary.lock();
                let handle = match secondary.entry(library.to_string()) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let handle = self.loader.load(library, &self.resolver)?;
                        tracing::debug!(target: "dlbind::bind", library, "opened redirected library");
                        entry.insert(handle)
                    }
                };
                handle.symbol(&target.name)
            }
        }
    }

    /// Keep `callback` alive until disposal. Retaining the same callback
    /// twice holds it once; nothing is held once disposed.
    pub fn retain(&self, callback: &Callback) {
        if self.is_disposed() {
            return;
        }
        let mut callbacks = self.callbacks.lock();
        if !callbacks.contains(callback) {
            callbacks.push(callback.clone());
        }
    }

    /// Number of callbacks currently held.
    pub fn retained_callbacks(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Mark disposed and close every handle. Returns `false` if already disposed.
    pub fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let released = std::mem::take(&mut *self.callbacks.lock());
        if !released.is_empty() {
            tracing::debug!(target: "dlbind::bind", count = released.len(), "released persistent callbacks");
        }
        self.close_handles();
        true
    }

    fn close_handles(&self) {
        for handle in self.secondary.lock().values() {
            if let Err(err) = handle.close() {
                tracing::warn!(target: "dlbind::bind", library = handle.name(), %err, "failed to close library");
            }
        }
        if let Err(err) = self.primary.close() {
            tracing::warn!(target: "dlbind::bind", library = self.library.as_str(), %err, "failed to close library");
        }
    }

    /// Number of redirected libraries opened so far.
    pub fn secondary_count(&self) -> usize {
        self.secondary.lock().len()
    }
}

impl fmt::Debug for LibraryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryState")
            .field("library", &self.library)
            .field("primary", &self.primary)
            .field("secondary", &self.secondary_count())
            .field("callbacks", &self.retained_callbacks())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Drop for LibraryState {
    fn drop(&mut self) {
        if !self.is_disposed() {
            self.close_handles();
        }
    }
}
