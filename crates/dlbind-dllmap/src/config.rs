//! Dllmap configuration model.

use std::path::Path;

use dlbind_targets::Platform;
use serde::{Deserialize, Serialize};

use crate::constraint::{parse_constraint, ArchSet, OsSet, PlatformConstraint, WordSizeSet};
use crate::error::{DllMapError, Result};
use crate::xml::{parse_document, Element};

/// A node that carries raw `os` / `cpu` / `wordsize` constraint attributes.
pub trait Constrained {
    fn raw_os(&self) -> Option<&str>;
    fn raw_cpu(&self) -> Option<&str>;
    fn raw_word_size(&self) -> Option<&str>;

    fn operating_systems(&self) -> OsSet {
        parse_constraint(self.raw_os())
    }

    fn architectures(&self) -> ArchSet {
        parse_constraint(self.raw_cpu())
    }

    fn word_sizes(&self) -> WordSizeSet {
        parse_constraint(self.raw_word_size())
    }

    /// Whether this node applies on `platform`.
    fn applies_to(&self, platform: &Platform) -> bool {
        PlatformConstraint::parse(self.raw_os(), self.raw_cpu(), self.raw_word_size())
            .matches(platform)
    }
}

/// A complete dllmap configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DllConfiguration {
    #[serde(default, rename = "dllmap")]
    pub maps: Vec<DllMap>,
}

/// A library mapping (`<dllmap>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DllMap {
    /// Library name as requested.
    #[serde(rename = "dll")]
    pub source_library: String,
    /// Library to load instead.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub wordsize: Option<String>,
    /// Per-symbol redirections.
    #[serde(default, rename = "dllentry")]
    pub entries: Vec<DllEntry>,
}

/// A symbol mapping (`<dllentry>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DllEntry {
    /// Library that exports the target symbol.
    #[serde(default, rename = "dll")]
    pub target_library: Option<String>,
    /// Symbol name as requested.
    #[serde(default, rename = "name")]
    pub source_symbol: Option<String>,
    /// Symbol to look up instead.
    #[serde(default, rename = "target")]
    pub target_symbol: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub wordsize: Option<String>,
}

impl Constrained for DllMap {
    fn raw_os(&self) -> Option<&str> {
        self.os.as_deref()
    }
    fn raw_cpu(&self) -> Option<&str> {
        self.cpu.as_deref()
    }
    fn raw_word_size(&self) -> Option<&str> {
        self.wordsize.as_deref()
    }
}

impl Constrained for DllEntry {
    fn raw_os(&self) -> Option<&str> {
        self.os.as_deref()
    }
    fn raw_cpu(&self) -> Option<&str> {
        self.cpu.as_deref()
    }
    fn raw_word_size(&self) -> Option<&str> {
        self.wordsize.as_deref()
    }
}

impl DllConfiguration {
    /// Parse an XML dllmap document.
    pub fn parse(xml: &str) -> Result<Self> {
        let root = parse_document(xml)?;
        if root.name != "configuration" {
            return Err(DllMapError::InvalidConfiguration {
                detail: format!("root element is <{}>, expected <configuration>", root.name),
            });
        }

        let maps = root
            .children_named("dllmap")
            .map(map_from_element)
            .collect::<Result<Vec<_>>>()?;

        let mut config = Self { maps };
        config.inherit_constraints();
        Ok(config)
    }

    /// Parse a TOML rendition of the same model.
    pub fn from_toml(input: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(input)?;
        config.inherit_constraints();
        Ok(config)
    }

    /// Load from a file; `.toml` files are read as TOML, anything else as XML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::parse(&content),
        }
    }

    /// Maps whose constraints admit `platform`, in document order.
    pub fn relevant_maps<'a>(&'a self, platform: &'a Platform) -> impl Iterator<Item = &'a DllMap> + 'a {
        self.maps.iter().filter(move |m| m.applies_to(platform))
    }

    /// Give every symbol entry its parent's constraint where it has none.
    fn inherit_constraints(&mut self) {
        for map in &mut self.maps {
            for entry in &mut map.entries {
                if entry.os.is_none() {
                    entry.os = map.os.clone();
                }
                if entry.cpu.is_none() {
                    entry.cpu = map.cpu.clone();
                }
                if entry.wordsize.is_none() {
                    entry.wordsize = map.wordsize.clone();
                }
            }
        }
    }
}

impl DllMap {
    /// Symbol entries that apply on `platform`.
    pub fn relevant_entries<'a>(&'a self, platform: &'a Platform) -> impl Iterator<Item = &'a DllEntry> + 'a {
        self.entries.iter().filter(move |e| e.applies_to(platform))
    }
}

fn owned(value: Option<&str>) -> Option<String> {
    value.map(str::to_string)
}

fn map_from_element(element: &Element) -> Result<DllMap> {
    let source_library = element
        .attr("dll")
        .ok_or_else(|| DllMapError::InvalidConfiguration {
            detail: "<dllmap> is missing the 'dll' attribute".to_string(),
        })?
        .to_string();

    let entries = element
        .children_named("dllentry")
        .map(|e| DllEntry {
            target_library: owned(e.attr("dll")),
            source_symbol: owned(e.attr("name")),
            target_symbol: owned(e.attr("target")),
            os: owned(e.attr("os")),
            cpu: owned(e.attr("cpu")),
            wordsize: owned(e.attr("wordsize")),
        })
        .collect();

    Ok(DllMap {
        source_library,
        target: owned(element.attr("target")),
        os: owned(element.attr("os")),
        cpu: owned(element.attr("cpu")),
        wordsize: owned(element.attr("wordsize")),
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<configuration>
  <dllmap dll="cygwin1.dll" target="libc.so.6"/>
  <dllmap dll="libgl" target="opengl32.dll" os="windows"/>
  <dllmap dll="libgl" target="libGL.so.1" os="!windows" cpu="x86_64">
    <dllentry name="glFoo" target="glFooEXT"/>
    <dllentry name="glBar" target="glBarARM" cpu="armv8"/>
  </dllmap>
</configuration>"#;

    #[test]
    fn parse_maps_and_entries() {
        let config = DllConfiguration::parse(SAMPLE).unwrap();
        assert_eq!(config.maps.len(), 3);
        assert_eq!(config.maps[0].source_library, "cygwin1.dll");
        assert_eq!(config.maps[0].target.as_deref(), Some("libc.so.6"));
        assert_eq!(config.maps[2].entries.len(), 2);
    }

    #[test]
    fn entries_inherit_parent_constraints() {
        let config = DllConfiguration::parse(SAMPLE).unwrap();
        let entries = &config.maps[2].entries;
        assert_eq!(entries[0].os.as_deref(), Some("!windows"));
        assert_eq!(entries[0].cpu.as_deref(), Some("x86_64"));
        assert_eq!(entries[1].cpu.as_deref(), Some("armv8"));
        assert_eq!(entries[1].os.as_deref(), Some("!windows"));
    }

    #[test]
    fn relevant_maps_filter_by_platform() {
        let config = DllConfiguration::parse(SAMPLE).unwrap();
        let linux = Platform::linux_x86_64();
        let targets: Vec<_> = config
            .relevant_maps(&linux)
            .filter_map(|m| m.target.as_deref())
            .collect();
        assert_eq!(targets, vec!["libc.so.6", "libGL.so.1"]);

        let windows = Platform::windows_x86_64();
        let targets: Vec<_> = config
            .relevant_maps(&windows)
            .filter_map(|m| m.target.as_deref())
            .collect();
        assert_eq!(targets, vec!["libc.so.6", "opengl32.dll"]);
    }

    #[test]
    fn missing_dll_attribute_is_invalid() {
        let err = DllConfiguration::parse("<configuration><dllmap target='x'/></configuration>")
            .unwrap_err();
        assert!(matches!(err, DllMapError::InvalidConfiguration { .. }));
    }

    #[test]
    fn wrong_root_is_invalid() {
        assert!(DllConfiguration::parse("<settings/>").is_err());
    }

    #[test]
    fn toml_form() {
        let toml = r#"
[[dllmap]]
dll = "libgl"
target = "libGL.so.1"
os = "linux"

[[dllmap.dllentry]]
name = "glFoo"
target = "glFooEXT"
"#;
        let config = DllConfiguration::from_toml(toml).unwrap();
        assert_eq!(config.maps[0].entries[0].os.as_deref(), Some("linux"));
        assert_eq!(
            config.maps[0].entries[0].target_symbol.as_deref(),
            Some("glFooEXT")
        );
    }

    #[test]
    fn load_picks_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let xml = dir.path().join("app.config");
        std::fs::write(&xml, SAMPLE).unwrap();
        assert_eq!(DllConfiguration::load(&xml).unwrap().maps.len(), 3);

        let toml = dir.path().join("dllmap.toml");
        std::fs::write(&toml, "[[dllmap]]\ndll = \"a\"\ntarget = \"b\"\n").unwrap();
        assert_eq!(DllConfiguration::load(&toml).unwrap().maps.len(), 1);
    }
}
