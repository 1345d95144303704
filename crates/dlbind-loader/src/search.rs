//! Per-OS library search strategies.
//!
//! Each strategy looks for one already-expanded candidate file name in its own
//! ordered list of directories and reports the first existing file.

use std::fmt;
use std::path::{Path, PathBuf};

use dlbind_targets::{Architecture, OperatingSystem};

use crate::context::SearchContext;
use crate::result::ResolvePathResult;

const NOT_FOUND: &str = "The specified library was not found in any of the loader search paths.";
const NO_LOCAL_COPY: &str = "No local copy of the given library could be found.";

/// A source of directories to search for a library file.
///
/// Object-safe so strategies can be stored in `Box<dyn SearchStrategy>`.
pub trait SearchStrategy: fmt::Debug + Send + Sync {
    /// Human-readable name of this strategy.
    fn name(&self) -> &str;

    /// Search for `library` (a file name or relative path).
    fn search(&self, library: &str, ctx: &SearchContext) -> ResolvePathResult;
}

/// Select the system strategy for an operating system.
pub fn system_strategy(os: OperatingSystem) -> Box<dyn SearchStrategy> {
    match os {
        OperatingSystem::Windows => Box::new(WindowsSearch),
        OperatingSystem::MacOS => Box::new(MacOsSearch),
        _ => Box::new(LinuxSearch),
    }
}

fn probe(dir: &Path, library: &str) -> Option<PathBuf> {
    let candidate = dir.join(library);
    if candidate.is_file() {
        Some(std::path::absolute(&candidate).unwrap_or(candidate))
    } else {
        None
    }
}

fn first_in<'a>(
    dirs: impl IntoIterator<Item = &'a PathBuf>,
    library: &str,
) -> Option<PathBuf> {
    dirs.into_iter().find_map(|dir| probe(dir, library))
}

/// Runtime-declared probing directories.
#[derive(Debug, Default)]
pub struct ProbingSearch;

impl SearchStrategy for ProbingSearch {
    fn name(&self) -> &str {
        "probing"
    }

    fn search(&self, library: &str, ctx: &SearchContext) -> ResolvePathResult {
        match first_in(&ctx.probing_directories, library) {
            Some(path) => ResolvePathResult::found(path),
            None => ResolvePathResult::not_found(library, NOT_FOUND),
        }
    }
}

/// Libraries bundled beside the application.
///
/// In the entry, executable, and current directories (in that order) looks
/// at `dir/name`, `dir/lib/name` and `dir/lib/<arch>/name`.
#[derive(Debug)]
pub struct LocalSearch {
    arch: Architecture,
}

impl LocalSearch {
    pub fn new(arch: Architecture) -> Self {
        Self { arch }
    }

    fn scan(&self, dir: &Path, library: &str) -> Option<PathBuf> {
        let lib = dir.join("lib");
        let arch = lib.join(self.arch.bundle_folder());
        probe(dir, library)
            .or_else(|| probe(&lib, library))
            .or_else(|| probe(&arch, library))
    }
}

impl SearchStrategy for LocalSearch {
    fn name(&self) -> &str {
        "local"
    }

    fn search(&self, library: &str, ctx: &SearchContext) -> ResolvePathResult {
        let dirs = [
            ctx.entry_directory.as_ref(),
            ctx.executable_directory.as_ref(),
            ctx.current_directory.as_ref(),
        ];
        match dirs
            .into_iter()
            .flatten()
            .find_map(|dir| self.scan(dir, library))
        {
            Some(path) => ResolvePathResult::found(path),
            None => ResolvePathResult::not_found(library, NO_LOCAL_COPY),
        }
    }
}

/// Linux and BSD loader order: `LD_LIBRARY_PATH`, loader cache, `/lib`, `/usr/lib`.
#[derive(Debug, Default)]
pub struct LinuxSearch;

impl LinuxSearch {
    fn search_cache(cache: &Path, library: &str) -> Option<PathBuf> {
        let bytes = std::fs::read(cache).ok()?;
        let wanted = Path::new(library).file_name()?;
        bytes
            .split(|b| *b == 0)
            .filter_map(|entry| std::str::from_utf8(entry).ok())
            .filter(|entry| entry.starts_with('/') && entry.ends_with(library))
            .map(PathBuf::from)
            .find(|path| path.file_name() == Some(wanted) && path.is_file())
    }
}

impl SearchStrategy for LinuxSearch {
    fn name(&self) -> &str {
        "linux"
    }

    fn search(&self, library: &str, ctx: &SearchContext) -> ResolvePathResult {
        if let Some(path) = first_in(&ctx.path_list("LD_LIBRARY_PATH", ':'), library) {
            return ResolvePathResult::found(path);
        }

        if let Some(path) = ctx
            .loader_cache
            .as_deref()
            .and_then(|cache| Self::search_cache(cache, library))
        {
            tracing::trace!(target: "dlbind::loader", path = %path.display(), "loader cache hit");
            return ResolvePathResult::found(path);
        }

        match first_in(&ctx.library_directories, library) {
            Some(path) => ResolvePathResult::found(path),
            None => ResolvePathResult::not_found(library, NOT_FOUND),
        }
    }
}

/// macOS dyld order: framework path, library path, then the two fallbacks.
#[derive(Debug, Default)]
pub struct MacOsSearch;

const DYLD_VARIABLES: [&str; 4] = [
    "DYLD_FRAMEWORK_PATH",
    "DYLD_LIBRARY_PATH",
    "DYLD_FALLBACK_FRAMEWORK_PATH",
    "DYLD_FALLBACK_LIBRARY_PATH",
];

impl SearchStrategy for MacOsSearch {
    fn name(&self) -> &str {
        "macos"
    }

    fn search(&self, library: &str, ctx: &SearchContext) -> ResolvePathResult {
        for var in DYLD_VARIABLES {
            if let Some(path) = first_in(&ctx.path_list(var, ':'), library) {
                return ResolvePathResult::found(path);
            }
        }
        ResolvePathResult::not_found(library, NOT_FOUND)
    }
}

/// Windows order: application dir, system dirs, current dir, `PATH`.
#[derive(Debug, Default)]
pub struct WindowsSearch;

impl SearchStrategy for WindowsSearch {
    fn name(&self) -> &str {
        "windows"
    }

    fn search(&self, library: &str, ctx: &SearchContext) -> ResolvePathResult {
        let mut dirs: Vec<PathBuf> = Vec::new();
        dirs.extend(ctx.entry_directory.clone());
        dirs.extend(ctx.system_directory.clone());
        if let Some(windows) = &ctx.windows_directory {
            dirs.push(windows.join("System"));
            dirs.push(windows.clone());
        }
        dirs.extend(ctx.current_directory.clone());
        dirs.extend(ctx.path_list("PATH", ';'));

        match first_in(&dirs, library) {
            Some(path) => ResolvePathResult::found(path),
            None => ResolvePathResult::not_found(library, NOT_FOUND),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn linux_prefers_ld_library_path() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        touch(&a.path().join("libdemo.so"));
        touch(&b.path().join("libdemo.so"));

        let ctx = SearchContext::empty()
            .with_var(
                "LD_LIBRARY_PATH",
                format!("{}:{}", a.path().display(), b.path().display()),
            );
        let result = LinuxSearch.search("libdemo.so", &ctx);
        assert_eq!(result.path(), Some(a.path().join("libdemo.so").as_path()));
    }

    #[test]
    fn linux_reads_loader_cache() {
        let libs = tempfile::tempdir().unwrap();
        let lib = libs.path().join("libcached.so.1");
        touch(&lib);

        let cache = libs.path().join("ld.so.cache");
        let mut contents = b"glibc-ld.so.cache1.1\0libcached.so.1\0".to_vec();
        contents.extend_from_slice(lib.to_str().unwrap().as_bytes());
        contents.push(0);
        fs::write(&cache, contents).unwrap();

        let mut ctx = SearchContext::empty();
        ctx.loader_cache = Some(cache);
        let result = LinuxSearch.search("libcached.so.1", &ctx);
        assert_eq!(result.path(), Some(lib.as_path()));
    }

    #[test]
    fn linux_falls_back_to_library_directories() {
        let usr = tempfile::tempdir().unwrap();
        touch(&usr.path().join("libz.so"));
        let mut ctx = SearchContext::empty();
        ctx.library_directories = vec![PathBuf::from("/nonexistent-dlbind"), usr.path().into()];
        assert!(LinuxSearch.search("libz.so", &ctx).is_success());
        assert!(!LinuxSearch.search("libnothere.so", &ctx).is_success());
    }

    #[test]
    fn macos_order_is_framework_then_library() {
        let framework = tempfile::tempdir().unwrap();
        let library = tempfile::tempdir().unwrap();
        touch(&framework.path().join("libm.dylib"));
        touch(&library.path().join("libm.dylib"));
        let ctx = SearchContext::empty()
            .with_var("DYLD_LIBRARY_PATH", library.path().to_str().unwrap())
            .with_var("DYLD_FRAMEWORK_PATH", framework.path().to_str().unwrap());
        let result = MacOsSearch.search("libm.dylib", &ctx);
        assert_eq!(
            result.path(),
            Some(framework.path().join("libm.dylib").as_path())
        );
    }

    #[test]
    fn windows_searches_system_before_path() {
        let windows = tempfile::tempdir().unwrap();
        let on_path = tempfile::tempdir().unwrap();
        touch(&windows.path().join("System").join("legacy.dll"));
        touch(&on_path.path().join("legacy.dll"));

        let mut ctx = SearchContext::empty().with_var("PATH", on_path.path().to_str().unwrap());
        ctx.windows_directory = Some(windows.path().to_path_buf());
        let result = WindowsSearch.search("legacy.dll", &ctx);
        assert_eq!(
            result.path(),
            Some(windows.path().join("System").join("legacy.dll").as_path())
        );
    }

    #[test]
    fn local_checks_arch_subfolder() {
        let app = tempfile::tempdir().unwrap();
        touch(&app.path().join("lib").join("x64").join("libbundled.so"));
        let mut ctx = SearchContext::empty();
        ctx.current_directory = Some(app.path().to_path_buf());

        let local = LocalSearch::new(Architecture::X86_64);
        assert!(local.search("libbundled.so", &ctx).is_success());

        let local32 = LocalSearch::new(Architecture::X86);
        assert!(!local32.search("libbundled.so", &ctx).is_success());
    }

    #[test]
    fn probing_directories() {
        let probe_dir = tempfile::tempdir().unwrap();
        touch(&probe_dir.path().join("libprobe.so"));
        let ctx = SearchContext::empty().with_probing_directory(probe_dir.path());
        assert!(ProbingSearch.search("libprobe.so", &ctx).is_success());
    }
}
