//! Binding configuration read from TOML.
//!
//! ```toml
//! [options]
//! lazy-binding = true
//! disposal-checks = true
//!
//! [search]
//! local-first = true
//! probing-directories = ["/opt/app/native"]
//!
//! [dllmap]
//! path = "app.exe.config"
//!
//! [naming]
//! prefix = "gl"
//! transform = "pascalize"
//! ```

use std::path::{Path, PathBuf};

use dlbind_core::{ImplementationOptions, SymbolNaming};
use dlbind_dllmap::{DllConfiguration, DllMapResolver};
use dlbind_loader::{LibraryPathResolver, SearchContext};
use dlbind_targets::Platform;
use serde::{Deserialize, Serialize};

use crate::builder::NativeLibraryBuilder;
use crate::error::Result;

/// Option toggles, one per [`ImplementationOptions`] flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OptionsConfig {
    pub lazy_binding: bool,
    pub disposal_checks: bool,
    pub dll_map: bool,
    pub indirect_calls: bool,
    pub suppress_security: bool,
    pub optimizations: bool,
}

impl OptionsConfig {
    pub fn flags(&self) -> ImplementationOptions {
        let mut flags = ImplementationOptions::empty();
        flags.set(ImplementationOptions::USE_LAZY_BINDING, self.lazy_binding);
        flags.set(ImplementationOptions::GENERATE_DISPOSAL_CHECKS, self.disposal_checks);
        flags.set(ImplementationOptions::ENABLE_DLL_MAP_SUPPORT, self.dll_map);
        flags.set(ImplementationOptions::USE_INDIRECT_CALLS, self.indirect_calls);
        flags.set(ImplementationOptions::SUPPRESS_SECURITY, self.suppress_security);
        flags.set(ImplementationOptions::ENABLE_OPTIMIZATIONS, self.optimizations);
        flags
    }
}

/// Library search settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SearchConfig {
    pub local_first: bool,
    pub probing_directories: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DllMapConfig {
    /// XML or TOML dllmap file. A missing file disables redirection.
    pub path: PathBuf,
}

/// Everything [`NativeLibraryBuilder::from_config`] reads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BindingConfig {
    pub options: OptionsConfig,
    pub search: SearchConfig,
    pub dllmap: Option<DllMapConfig>,
    pub naming: Option<SymbolNaming>,
    /// Target platform; the host when absent.
    pub platform: Option<Platform>,
}

impl BindingConfig {
    pub fn from_toml(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

impl NativeLibraryBuilder {
    /// Builder configured from `config`, with the native loader.
    pub fn from_config(config: &BindingConfig) -> Result<Self> {
        let platform = match config.platform {
            Some(platform) => platform,
            None => Platform::current()?,
        };

        let resolver = config.search.probing_directories.iter().fold(
            LibraryPathResolver::new(platform, SearchContext::from_process(platform.os))
                .with_local_first(config.search.local_first),
            |resolver, dir| resolver.with_probing_directory(dir.clone()),
        );

        let mut builder = Self::new()
            .with_options(config.options.flags())
            .with_platform(platform)
            .with_resolver(resolver);

        if let Some(dllmap) = &config.dllmap {
            let resolver = if dllmap.path.is_file() {
                DllMapResolver::new(platform, DllConfiguration::load(&dllmap.path)?)
            } else {
                tracing::warn!(
                    target: "dlbind::bind",
                    path = %dllmap.path.display(),
                    "dllmap file not found, redirection disabled"
                );
                DllMapResolver::identity(platform)
            };
            builder = builder.with_dllmap(resolver);
        }
        if let Some(naming) = &config.naming {
            builder = builder.with_naming(naming.clone());
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dlbind_core::SymbolTransform;
    use std::io::Write;

    const CONFIG: &str = r#"
[options]
lazy-binding = true
indirect-calls = true

[search]
local-first = true
probing-directories = ["/opt/app/native"]

[naming]
prefix = "gl"
transform = "pascalize"

[platform]
os = "linux"
arch = "x86-64"
word-size = "word64"
"#;

    #[test]
    fn parses_kebab_case_toml() {
        let config = BindingConfig::from_toml(CONFIG).unwrap();
        assert_eq!(
            config.options.flags(),
            ImplementationOptions::USE_LAZY_BINDING | ImplementationOptions::USE_INDIRECT_CALLS
        );
        assert!(config.search.local_first);
        assert_eq!(config.search.probing_directories, [PathBuf::from("/opt/app/native")]);
        assert_eq!(config.naming.as_ref().unwrap().transform, SymbolTransform::Pascalize);
        assert_eq!(config.platform, Some(Platform::linux_x86_64()));
        assert!(config.dllmap.is_none());
    }

    #[test]
    fn empty_config_is_default() {
        let config = BindingConfig::from_toml("").unwrap();
        assert_eq!(config, BindingConfig::default());
        assert!(config.options.flags().is_empty());
    }

    #[test]
    fn unknown_transform_is_rejected() {
        let err = BindingConfig::from_toml("[naming]\ntransform = \"shout\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn builder_from_config_loads_dllmap_file() {
        let mut file = tempfile::Builder::new().suffix(".config").tempfile().unwrap();
        write!(
            file,
            r#"<configuration><dllmap dll="cygwin1.dll" target="libc.so.6"/></configuration>"#
        )
        .unwrap();
        let config = BindingConfig {
            dllmap: Some(DllMapConfig {
                path: file.path().to_path_buf(),
            }),
            platform: Some(Platform::linux_x86_64()),
            ..BindingConfig::default()
        };
        let builder = NativeLibraryBuilder::from_config(&config).unwrap();
        assert!(builder.options().is_empty());
    }

    #[test]
    fn missing_dllmap_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = BindingConfig {
            dllmap: Some(DllMapConfig {
                path: dir.path().join("absent.config"),
            }),
            platform: Some(Platform::linux_x86_64()),
            ..BindingConfig::default()
        };
        assert!(NativeLibraryBuilder::from_config(&config).is_ok());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binding.toml");
        std::fs::write(&path, CONFIG).unwrap();
        let config = BindingConfig::load(&path).unwrap();
        assert!(config.options.lazy_binding);
    }
}
