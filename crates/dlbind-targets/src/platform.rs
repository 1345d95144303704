//! Complete platform model.
//!
//! Composes operating system, architecture, and word size into the single
//! value the resolver, the redirection layer, and the name manglers consult.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::arch::Architecture;
use crate::error::{Result, TargetError};
use crate::os::OperatingSystem;

/// Pointer width of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WordSize {
    Word32,
    Word64,
}

impl WordSize {
    /// Both word sizes.
    pub const ALL: [WordSize; 2] = [WordSize::Word32, WordSize::Word64];

    /// Word size of the running process.
    pub fn detect() -> Self {
        if std::mem::size_of::<usize>() == 4 {
            Self::Word32
        } else {
            Self::Word64
        }
    }

    /// Parse "32"/"64" (or "word32"/"word64"), case-insensitively.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "32" | "word32" => Ok(Self::Word32),
            "64" | "word64" => Ok(Self::Word64),
            _ => Err(TargetError::UnknownComponent {
                component: "word size",
                value: name.to_string(),
            }),
        }
    }

    /// Pointer width in bytes.
    pub fn bytes(self) -> u32 {
        match self {
            Self::Word32 => 4,
            Self::Word64 => 8,
        }
    }

    /// Canonical name, as written in dllmap files.
    pub fn config_name(self) -> &'static str {
        match self {
            Self::Word32 => "32",
            Self::Word64 => "64",
        }
    }
}

impl fmt::Display for WordSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_name())
    }
}

/// A host platform: operating system, architecture, and word size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Platform {
    pub os: OperatingSystem,
    pub arch: Architecture,
    pub word_size: WordSize,
}

impl Platform {
    /// Compose a platform from its three parts.
    pub fn new(os: OperatingSystem, arch: Architecture, word_size: WordSize) -> Self {
        Self { os, arch, word_size }
    }

    /// Detect the platform of the running process.
    pub fn current() -> Result<Self> {
        Ok(Self {
            os: OperatingSystem::detect()?,
            arch: Architecture::detect()?,
            word_size: WordSize::detect(),
        })
    }

    /// Pointer width in bytes.
    pub fn pointer_size(&self) -> u32 {
        self.word_size.bytes()
    }

    /// Shared library file suffix for this platform.
    pub fn library_suffix(&self) -> &'static str {
        self.os.library_suffix()
    }

    /// Shared library file prefix for this platform.
    pub fn library_prefix(&self) -> &'static str {
        self.os.library_prefix()
    }

    /// Construct a 64-bit Linux x86-64 platform.
    pub fn linux_x86_64() -> Self {
        Self::new(OperatingSystem::Linux, Architecture::X86_64, WordSize::Word64)
    }

    /// Construct a 64-bit Linux AArch64 platform.
    pub fn linux_aarch64() -> Self {
        Self::new(OperatingSystem::Linux, Architecture::ArmV8, WordSize::Word64)
    }

    /// Construct a 64-bit macOS AArch64 platform.
    pub fn macos_aarch64() -> Self {
        Self::new(OperatingSystem::MacOS, Architecture::ArmV8, WordSize::Word64)
    }

    /// Construct a 64-bit Windows x86-64 platform.
    pub fn windows_x86_64() -> Self {
        Self::new(OperatingSystem::Windows, Architecture::X86_64, WordSize::Word64)
    }

    /// Construct a 32-bit Windows x86 platform.
    pub fn windows_x86() -> Self {
        Self::new(OperatingSystem::Windows, Architecture::X86, WordSize::Word32)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.os, self.arch, self.word_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_size_parse() {
        assert_eq!(WordSize::parse("32").unwrap(), WordSize::Word32);
        assert_eq!(WordSize::parse("Word64").unwrap(), WordSize::Word64);
        assert!(WordSize::parse("16").is_err());
    }

    #[test]
    fn pointer_sizes() {
        assert_eq!(Platform::windows_x86().pointer_size(), 4);
        assert_eq!(Platform::linux_x86_64().pointer_size(), 8);
    }

    #[test]
    fn current_matches_process_pointer_width() {
        let platform = Platform::current().unwrap();
        assert_eq!(
            platform.pointer_size() as usize,
            std::mem::size_of::<usize>()
        );
    }

    #[test]
    fn display_uses_config_names() {
        assert_eq!(Platform::macos_aarch64().to_string(), "osx-armv8-64");
    }

    #[test]
    fn serde_round_trip() {
        let p = Platform::windows_x86();
        let json = serde_json::to_string(&p).unwrap();
        let parsed: Platform = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, p);
    }
}
