//! Library and symbol name mapping.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use dlbind_targets::Platform;

use crate::config::DllConfiguration;
use crate::error::{DllMapError, Result};

/// A symbol after redirection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRedirect {
    /// Library that exports the symbol, when a mapping moved it elsewhere.
    pub library: Option<String>,
    /// Symbol name to look up.
    pub symbol: String,
}

/// Applies a dllmap configuration for one platform.
///
/// A resolver without configuration maps every name to itself.
#[derive(Debug, Clone)]
pub struct DllMapResolver {
    platform: Platform,
    configuration: Option<DllConfiguration>,
}

impl DllMapResolver {
    /// Create a resolver over an explicit configuration.
    pub fn new(platform: Platform, configuration: DllConfiguration) -> Self {
        Self {
            platform,
            configuration: Some(configuration),
        }
    }

    /// A resolver that performs no redirection.
    pub fn identity(platform: Platform) -> Self {
        Self {
            platform,
            configuration: None,
        }
    }

    /// Config file path for a binary: `<binary>.config` in the same directory.
    pub fn config_path_for(binary: &Path) -> PathBuf {
        let mut name = OsString::from(binary.as_os_str());
        name.push(".config");
        PathBuf::from(name)
    }

    /// Load the config beside `binary`. A missing file means no redirection.
    pub fn for_binary(binary: &Path, platform: Platform) -> Result<Self> {
        let path = Self::config_path_for(binary);
        if !path.is_file() {
            tracing::debug!(target: "dlbind::dllmap", path = %path.display(), "no dllmap file, redirection disabled");
            return Ok(Self::identity(platform));
        }
        let configuration = DllConfiguration::load(&path)?;
        tracing::debug!(
            target: "dlbind::dllmap",
            path = %path.display(),
            maps = configuration.maps.len(),
            "loaded dllmap file"
        );
        Ok(Self::new(platform, configuration))
    }

    /// Load the config beside the running executable.
    pub fn for_current_exe(platform: Platform) -> Result<Self> {
        let exe = std::env::current_exe()?;
        Self::for_binary(&exe, platform)
    }

    /// Whether a configuration is present.
    pub fn has_configuration(&self) -> bool {
        self.configuration.is_some()
    }

    /// The configuration in use, if any.
    pub fn configuration(&self) -> Option<&DllConfiguration> {
        self.configuration.as_ref()
    }

    /// Map a requested library name to the one that should be loaded.
    ///
    /// The first relevant mapping for the name wins. A mapping without a
    /// target is an error.
    pub fn map_library_name(&self, library: &str) -> Result<String> {
        let Some(config) = &self.configuration else {
            return Ok(library.to_string());
        };
        let Some(map) = config
            .relevant_maps(&self.platform)
            .find(|m| m.source_library == library)
        else {
            return Ok(library.to_string());
        };

        match &map.target {
            Some(target) => {
                tracing::debug!(target: "dlbind::dllmap", library, target = target.as_str(), "mapped library");
                Ok(target.clone())
            }
            None => Err(DllMapError::MissingTarget {
                library: library.to_string(),
            }),
        }
    }

    /// Map a symbol requested from `library`.
    ///
    /// `library` is the name as requested, before library mapping.
    pub fn map_symbol(&self, library: &str, symbol: &str) -> SymbolRedirect {
        let unchanged = SymbolRedirect {
            library: None,
            symbol: symbol.to_string(),
        };
        let Some(config) = &self.configuration else {
            return unchanged;
        };

        let entry = config
            .relevant_maps(&self.platform)
            .filter(|m| m.source_library == library)
            .flat_map(|m| m.relevant_entries(&self.platform))
            .find(|e| e.source_symbol.as_deref() == Some(symbol));

        match entry {
            Some(entry) => {
                let redirect = SymbolRedirect {
                    library: entry.target_library.clone(),
                    symbol: entry
                        .target_symbol
                        .clone()
                        .unwrap_or_else(|| symbol.to_string()),
                };
                tracing::debug!(
                    target: "dlbind::dllmap",
                    library,
                    symbol,
                    to = redirect.symbol.as_str(),
                    "mapped symbol"
                );
                redirect
            }
            None => unchanged,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(xml: &str) -> DllConfiguration {
        DllConfiguration::parse(xml).unwrap()
    }

    #[test]
    fn unconditional_mapping() {
        let resolver = DllMapResolver::new(
            Platform::linux_x86_64(),
            config(r#"<configuration><dllmap dll="cygwin1.dll" target="libc.so.6"/></configuration>"#),
        );
        assert_eq!(resolver.map_library_name("cygwin1.dll").unwrap(), "libc.so.6");
        assert_eq!(resolver.map_library_name("other.dll").unwrap(), "other.dll");
    }

    #[test]
    fn constrained_mapping_matches_only_its_platform() {
        let cfg = config(
            r#"<configuration>
  <dllmap dll="foo" target="libfoo64.so" os="linux" cpu="x86_64" wordsize="64"/>
</configuration>"#,
        );
        let linux = DllMapResolver::new(Platform::linux_x86_64(), cfg.clone());
        assert_eq!(linux.map_library_name("foo").unwrap(), "libfoo64.so");

        let arm = DllMapResolver::new(Platform::linux_aarch64(), cfg.clone());
        assert_eq!(arm.map_library_name("foo").unwrap(), "foo");

        let windows = DllMapResolver::new(Platform::windows_x86(), cfg);
        assert_eq!(windows.map_library_name("foo").unwrap(), "foo");
    }

    #[test]
    fn negated_os_mapping() {
        let cfg = config(r#"<configuration><dllmap dll="gdi" target="libgdi.so" os="!windows,osx"/></configuration>"#);
        let linux = DllMapResolver::new(Platform::linux_x86_64(), cfg.clone());
        assert_eq!(linux.map_library_name("gdi").unwrap(), "libgdi.so");
        let mac = DllMapResolver::new(Platform::macos_aarch64(), cfg);
        assert_eq!(mac.map_library_name("gdi").unwrap(), "gdi");
    }

    #[test]
    fn mapping_without_target_is_an_error() {
        let resolver = DllMapResolver::new(
            Platform::linux_x86_64(),
            config(r#"<configuration><dllmap dll="foo"/></configuration>"#),
        );
        assert!(matches!(
            resolver.map_library_name("foo"),
            Err(DllMapError::MissingTarget { .. })
        ));
    }

    #[test]
    fn symbol_entries_with_inherited_constraints() {
        let cfg = config(
            r#"<configuration>
  <dllmap dll="libgl" target="libGL.so.1" os="linux">
    <dllentry name="glFoo" target="glFooEXT"/>
    <dllentry name="glBar" dll="libGLESv2.so" target="glBarES" os="windows"/>
  </dllmap>
</configuration>"#,
        );
        let resolver = DllMapResolver::new(Platform::linux_x86_64(), cfg);
        assert_eq!(
            resolver.map_symbol("libgl", "glFoo"),
            SymbolRedirect {
                library: None,
                symbol: "glFooEXT".into()
            }
        );
        // glBar's own constraint excludes linux.
        assert_eq!(resolver.map_symbol("libgl", "glBar").symbol, "glBar");
        assert_eq!(resolver.map_symbol("libgl", "glBaz").symbol, "glBaz");
    }

    #[test]
    fn symbol_entry_can_move_library() {
        let cfg = config(
            r#"<configuration>
  <dllmap dll="libgl" target="libGL.so.1">
    <dllentry name="glBar" dll="libGLESv2.so" target="glBarES"/>
  </dllmap>
</configuration>"#,
        );
        let resolver = DllMapResolver::new(Platform::linux_x86_64(), cfg);
        let redirect = resolver.map_symbol("libgl", "glBar");
        assert_eq!(redirect.library.as_deref(), Some("libGLESv2.so"));
        assert_eq!(redirect.symbol, "glBarES");
    }

    #[test]
    fn missing_config_file_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("app");
        let resolver = DllMapResolver::for_binary(&binary, Platform::linux_x86_64()).unwrap();
        assert!(!resolver.has_configuration());
        assert_eq!(resolver.map_library_name("cygwin1.dll").unwrap(), "cygwin1.dll");
    }

    #[test]
    fn config_file_beside_binary() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("app.exe");
        std::fs::write(
            dir.path().join("app.exe.config"),
            r#"<configuration><dllmap dll="cygwin1.dll" target="libc.so.6"/></configuration>"#,
        )
        .unwrap();
        let resolver = DllMapResolver::for_binary(&binary, Platform::linux_x86_64()).unwrap();
        assert_eq!(resolver.map_library_name("cygwin1.dll").unwrap(), "libc.so.6");
    }

    #[test]
    fn malformed_config_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("app");
        std::fs::write(dir.path().join("app.config"), "<configuration>").unwrap();
        assert!(DllMapResolver::for_binary(&binary, Platform::linux_x86_64()).is_err());
    }
}
