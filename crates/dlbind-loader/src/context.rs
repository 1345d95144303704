//! Environment snapshot consulted by the search strategies.
//!
//! Strategies never read process state directly. [`SearchContext::from_process`]
//! captures it once; tests build contexts by hand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use dlbind_targets::OperatingSystem;

/// Environment variable listing extra native probing directories.
pub const PROBING_DIRECTORIES_VAR: &str = "DLBIND_PROBING_DIRECTORIES";

/// Variables the search strategies consult.
const SEARCH_VARIABLES: [&str; 6] = [
    "PATH",
    "LD_LIBRARY_PATH",
    "DYLD_FRAMEWORK_PATH",
    "DYLD_LIBRARY_PATH",
    "DYLD_FALLBACK_FRAMEWORK_PATH",
    "DYLD_FALLBACK_LIBRARY_PATH",
];

/// Everything a library search may look at besides the filesystem.
#[derive(Debug, Clone, Default)]
pub struct SearchContext {
    vars: HashMap<String, String>,
    /// Runtime-declared native probing directories, searched first.
    pub probing_directories: Vec<PathBuf>,
    /// Directory of the program entry point.
    pub entry_directory: Option<PathBuf>,
    /// Directory of the executing module.
    pub executable_directory: Option<PathBuf>,
    /// Working directory at capture time.
    pub current_directory: Option<PathBuf>,
    /// Windows system directory (`System32`).
    pub system_directory: Option<PathBuf>,
    /// Windows installation directory.
    pub windows_directory: Option<PathBuf>,
    /// Location of the Linux loader cache.
    pub loader_cache: Option<PathBuf>,
    /// Trusted library directories searched last on Unix.
    pub library_directories: Vec<PathBuf>,
}

impl SearchContext {
    /// An empty context: no variables, no directories.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Capture the search context of the running process.
    pub fn from_process(os: OperatingSystem) -> Self {
        let vars: HashMap<String, String> = SEARCH_VARIABLES
            .iter()
            .chain(std::iter::once(&PROBING_DIRECTORIES_VAR))
            .filter_map(|key| std::env::var(key).ok().map(|v| ((*key).to_string(), v)))
            .collect();

        let probing_directories = vars
            .get(PROBING_DIRECTORIES_VAR)
            .map(|v| split_path_list(v, os.path_list_separator()))
            .unwrap_or_default();

        let executable_directory = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));

        let windows_directory = std::env::var("SystemRoot")
            .or_else(|_| std::env::var("windir"))
            .ok()
            .map(PathBuf::from);

        Self {
            vars,
            probing_directories,
            entry_directory: executable_directory.clone(),
            executable_directory,
            current_directory: std::env::current_dir().ok(),
            system_directory: windows_directory.as_ref().map(|w| w.join("System32")),
            windows_directory,
            loader_cache: Some(PathBuf::from("/etc/ld.so.cache")),
            library_directories: vec![PathBuf::from("/lib"), PathBuf::from("/usr/lib")],
        }
    }

    /// Set an environment variable in this context.
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Add a probing directory.
    pub fn with_probing_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.probing_directories.push(dir.into());
        self
    }

    /// Look up a captured environment variable.
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Split a captured path-list variable, skipping blank entries.
    pub fn path_list(&self, key: &str, separator: char) -> Vec<PathBuf> {
        self.var(key)
            .map(|v| split_path_list(v, separator))
            .unwrap_or_default()
    }
}

fn split_path_list(value: &str, separator: char) -> Vec<PathBuf> {
    value
        .split(separator)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(PathBuf::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_list_skips_blanks() {
        let ctx = SearchContext::empty().with_var("LD_LIBRARY_PATH", "/a:: :/b");
        assert_eq!(
            ctx.path_list("LD_LIBRARY_PATH", ':'),
            vec![PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn missing_variable_is_empty() {
        let ctx = SearchContext::empty();
        assert!(ctx.var("PATH").is_none());
        assert!(ctx.path_list("PATH", ';').is_empty());
    }

    #[test]
    fn process_context_has_unix_library_dirs() {
        let ctx = SearchContext::from_process(OperatingSystem::Linux);
        assert_eq!(ctx.library_directories.len(), 2);
        assert_eq!(ctx.loader_cache.as_deref(), Some(Path::new("/etc/ld.so.cache")));
    }
}
