//! Library name resolution.
//!
//! Turns a library name as written in a contract ("m", "libfoo.so.6",
//! "./plugins/bar") into the path the loader should open.

use std::path::{Path, PathBuf};

use dlbind_targets::{OperatingSystem, Platform};

use crate::context::SearchContext;
use crate::error::Result;
use crate::result::ResolvePathResult;
use crate::search::{system_strategy, LocalSearch, ProbingSearch, SearchStrategy};

/// Library name that resolves to the running program's own symbol table.
pub const INTERNAL_LIBRARY: &str = "__Internal";

/// Resolves library names against a platform's search order.
#[derive(Debug)]
pub struct LibraryPathResolver {
    platform: Platform,
    context: SearchContext,
    local_first: bool,
    probing: ProbingSearch,
    local: LocalSearch,
    system: Box<dyn SearchStrategy>,
}

impl LibraryPathResolver {
    /// Create a resolver for an explicit platform and search context.
    pub fn new(platform: Platform, context: SearchContext) -> Self {
        Self {
            platform,
            context,
            local_first: true,
            probing: ProbingSearch,
            local: LocalSearch::new(platform.arch),
            system: system_strategy(platform.os),
        }
    }

    /// Create a resolver for the running process.
    pub fn from_process() -> Result<Self> {
        let platform = Platform::current()?;
        let context = SearchContext::from_process(platform.os);
        Ok(Self::new(platform, context))
    }

    /// Whether bundled local copies are searched before the system order.
    pub fn with_local_first(mut self, local_first: bool) -> Self {
        self.local_first = local_first;
        self
    }

    /// Append a probing directory to the search context.
    pub fn with_probing_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.context.probing_directories.push(dir.into());
        self
    }

    /// The platform this resolver targets.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// The captured search context.
    pub fn context(&self) -> &SearchContext {
        &self.context
    }

    /// Generate the ordered candidate file names for a library name.
    ///
    /// The literal name always comes first. Names with a directory component
    /// are expanded on their file name and re-joined to the parent.
    pub fn candidates(&self, library: &str) -> Vec<String> {
        let as_path = Path::new(library);
        let parent = if is_path_like(library) {
            as_path.parent().filter(|p| !p.as_os_str().is_empty())
        } else {
            None
        };
        let file_name = match parent {
            Some(_) => as_path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_else(|| library.to_string()),
            None => library.to_string(),
        };

        let mut candidates = vec![file_name.clone()];
        match self.platform.os {
            OperatingSystem::Windows => {
                if !file_name.to_ascii_lowercase().ends_with(".dll") {
                    candidates.push(format!("{file_name}.dll"));
                }
            }
            os => candidates.extend(unix_candidates(&file_name, os.library_suffix())),
        }

        match parent {
            Some(parent) => candidates
                .into_iter()
                .map(|c| parent.join(c).to_string_lossy().into_owned())
                .collect(),
            None => candidates,
        }
    }

    /// Resolve a library name.
    pub fn resolve(&self, library: &str) -> ResolvePathResult {
        if library == INTERNAL_LIBRARY {
            tracing::debug!(target: "dlbind::loader", "resolved {INTERNAL_LIBRARY} to the main program");
            return ResolvePathResult::main_program();
        }

        let candidates = self.candidates(library);

        if is_path_like(library) {
            if let Some(found) = candidates.iter().map(PathBuf::from).find(|c| c.is_file()) {
                let path = std::path::absolute(&found).unwrap_or(found);
                tracing::debug!(target: "dlbind::loader", library, path = %path.display(), "resolved direct path");
                return ResolvePathResult::found(path);
            }
        }

        let mut strategies: Vec<&dyn SearchStrategy> = vec![&self.probing];
        if self.local_first {
            strategies.push(&self.local);
        }
        strategies.push(self.system.as_ref());

        for strategy in strategies {
            for candidate in &candidates {
                let result = strategy.search(candidate, &self.context);
                if result.is_success() {
                    tracing::debug!(
                        target: "dlbind::loader",
                        library,
                        candidate = candidate.as_str(),
                        strategy = strategy.name(),
                        "resolved library"
                    );
                    return result;
                }
            }
        }

        tracing::debug!(target: "dlbind::loader", library, ?candidates, "library not found");
        ResolvePathResult::not_found(
            library,
            "The specified library was not found in any of the loader search paths.",
        )
    }
}

fn is_path_like(library: &str) -> bool {
    library.contains('/') || library.contains('\\')
}

fn unix_candidates(library: &str, suffix: &str) -> Vec<String> {
    const PREFIX: &str = "lib";
    let no_suffix = !library.ends_with(suffix);
    let no_prefix = !library.starts_with(PREFIX);

    let mut out = Vec::new();
    if no_suffix {
        out.push(format!("{library}{suffix}"));
    }
    if no_prefix {
        out.push(format!("{PREFIX}{library}"));
    }
    if no_prefix && no_suffix {
        out.push(format!("{PREFIX}{library}{suffix}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn linux_resolver(ctx: SearchContext) -> LibraryPathResolver {
        LibraryPathResolver::new(Platform::linux_x86_64(), ctx)
    }

    #[test]
    fn bare_name_candidates_on_linux() {
        let r = linux_resolver(SearchContext::empty());
        assert_eq!(r.candidates("m"), vec!["m", "m.so", "libm", "libm.so"]);
    }

    #[test]
    fn existing_prefix_and_suffix_are_not_repeated() {
        let r = linux_resolver(SearchContext::empty());
        assert_eq!(r.candidates("libc.so"), vec!["libc.so"]);
        assert_eq!(r.candidates("libfoo"), vec!["libfoo", "libfoo.so"]);
    }

    #[test]
    fn macos_uses_dylib() {
        let r = LibraryPathResolver::new(Platform::macos_aarch64(), SearchContext::empty());
        assert_eq!(
            r.candidates("z"),
            vec!["z", "z.dylib", "libz", "libz.dylib"]
        );
    }

    #[test]
    fn windows_appends_dll() {
        let r = LibraryPathResolver::new(Platform::windows_x86_64(), SearchContext::empty());
        assert_eq!(r.candidates("kernel32"), vec!["kernel32", "kernel32.dll"]);
        assert_eq!(r.candidates("user32.dll"), vec!["user32.dll"]);
    }

    #[test]
    fn path_candidates_rejoin_parent() {
        let r = linux_resolver(SearchContext::empty());
        assert_eq!(
            r.candidates("plugins/demo"),
            vec![
                "plugins/demo",
                "plugins/demo.so",
                "plugins/libdemo",
                "plugins/libdemo.so"
            ]
        );
    }

    #[test]
    fn internal_sentinel_is_main_program() {
        let r = linux_resolver(SearchContext::empty());
        assert_eq!(r.resolve(INTERNAL_LIBRARY), ResolvePathResult::main_program());
    }

    #[test]
    fn path_like_name_found_by_variant() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("libplugin.so"), b"").unwrap();
        let r = linux_resolver(SearchContext::empty());
        let requested = format!("{}/plugin", dir.path().display());
        let result = r.resolve(&requested);
        assert_eq!(result.path(), Some(dir.path().join("libplugin.so").as_path()));
    }

    #[test]
    fn local_first_wins_over_system() {
        let app = tempfile::tempdir().unwrap();
        let system = tempfile::tempdir().unwrap();
        fs::write(app.path().join("libdemo.so"), b"").unwrap();
        fs::write(system.path().join("libdemo.so"), b"").unwrap();

        let mut ctx = SearchContext::empty();
        ctx.current_directory = Some(app.path().to_path_buf());
        ctx.library_directories = vec![system.path().to_path_buf()];

        let local = linux_resolver(ctx.clone());
        assert_eq!(
            local.resolve("demo").path(),
            Some(app.path().join("libdemo.so").as_path())
        );

        let system_only = linux_resolver(ctx).with_local_first(false);
        assert_eq!(
            system_only.resolve("demo").path(),
            Some(system.path().join("libdemo.so").as_path())
        );
    }

    #[test]
    fn probing_directories_come_first() {
        let probe = tempfile::tempdir().unwrap();
        let app = tempfile::tempdir().unwrap();
        fs::write(probe.path().join("libdemo.so"), b"").unwrap();
        fs::write(app.path().join("libdemo.so"), b"").unwrap();

        let mut ctx = SearchContext::empty();
        ctx.current_directory = Some(app.path().to_path_buf());
        let r = linux_resolver(ctx).with_probing_directory(probe.path());
        assert_eq!(
            r.resolve("demo").path(),
            Some(probe.path().join("libdemo.so").as_path())
        );
    }

    #[test]
    fn not_found_names_original_argument() {
        let r = linux_resolver(SearchContext::empty());
        match r.resolve("definitely-missing") {
            ResolvePathResult::NotFound { library, reason } => {
                assert_eq!(library, "definitely-missing");
                assert!(reason.contains("not found"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }
}
