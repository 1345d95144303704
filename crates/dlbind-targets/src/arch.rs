//! Processor architecture model.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};

/// A processor architecture a native library can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Architecture {
    X86,
    X86_64,
    Sparc,
    PowerPc,
    S390,
    S390x,
    Arm,
    /// 64-bit ARM (AArch64).
    ArmV8,
    Mips,
    Alpha,
    Hppa,
    Ia64,
}

impl Architecture {
    /// Every known architecture, in declaration order.
    pub const ALL: [Architecture; 12] = [
        Architecture::X86,
        Architecture::X86_64,
        Architecture::Sparc,
        Architecture::PowerPc,
        Architecture::S390,
        Architecture::S390x,
        Architecture::Arm,
        Architecture::ArmV8,
        Architecture::Mips,
        Architecture::Alpha,
        Architecture::Hppa,
        Architecture::Ia64,
    ];

    /// Detect the architecture of the running process.
    pub fn detect() -> Result<Self> {
        match std::env::consts::ARCH {
            "x86" => Ok(Self::X86),
            "x86_64" => Ok(Self::X86_64),
            "arm" => Ok(Self::Arm),
            "aarch64" => Ok(Self::ArmV8),
            "sparc" | "sparc64" => Ok(Self::Sparc),
            "powerpc" | "powerpc64" => Ok(Self::PowerPc),
            "s390x" => Ok(Self::S390x),
            "mips" | "mips64" => Ok(Self::Mips),
            other => Err(TargetError::PlatformNotSupported {
                detail: format!("couldn't detect the current architecture: {other}"),
            }),
        }
    }

    /// Parse an architecture name, case-insensitively. `-` is read as `_`.
    pub fn parse(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "x86" | "i386" | "i686" => Ok(Self::X86),
            "x86_64" | "amd64" | "x64" => Ok(Self::X86_64),
            "sparc" => Ok(Self::Sparc),
            "ppc" | "powerpc" => Ok(Self::PowerPc),
            "s390" => Ok(Self::S390),
            "s390x" => Ok(Self::S390x),
            "arm" => Ok(Self::Arm),
            "armv8" | "aarch64" | "arm64" => Ok(Self::ArmV8),
            "mips" => Ok(Self::Mips),
            "alpha" => Ok(Self::Alpha),
            "hppa" => Ok(Self::Hppa),
            "ia64" => Ok(Self::Ia64),
            _ => Err(TargetError::UnknownComponent {
                component: "architecture",
                value: name.to_string(),
            }),
        }
    }

    /// Canonical lowercase name, as written in dllmap files.
    pub fn config_name(self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X86_64 => "x86_64",
            Self::Sparc => "sparc",
            Self::PowerPc => "ppc",
            Self::S390 => "s390",
            Self::S390x => "s390x",
            Self::Arm => "arm",
            Self::ArmV8 => "armv8",
            Self::Mips => "mips",
            Self::Alpha => "alpha",
            Self::Hppa => "hppa",
            Self::Ia64 => "ia64",
        }
    }

    /// Name of the arch-specific subfolder probed beside bundled libraries.
    pub fn bundle_folder(self) -> &'static str {
        match self {
            Self::X86_64 | Self::Ia64 => "x64",
            Self::X86 => "x86",
            Self::ArmV8 => "arm64",
            Self::Arm => "arm",
            other => other.config_name(),
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_aliases() {
        assert_eq!(Architecture::parse("AMD64").unwrap(), Architecture::X86_64);
        assert_eq!(Architecture::parse("x86-64").unwrap(), Architecture::X86_64);
        assert_eq!(Architecture::parse("aarch64").unwrap(), Architecture::ArmV8);
        assert!(Architecture::parse("z80").is_err());
    }

    #[test]
    fn bundle_folders() {
        assert_eq!(Architecture::X86_64.bundle_folder(), "x64");
        assert_eq!(Architecture::X86.bundle_folder(), "x86");
        assert_eq!(Architecture::ArmV8.bundle_folder(), "arm64");
    }

    #[test]
    fn config_names_round_trip() {
        for arch in Architecture::ALL {
            assert_eq!(Architecture::parse(arch.config_name()).unwrap(), arch);
        }
    }
}
