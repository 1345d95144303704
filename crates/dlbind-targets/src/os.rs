//! Operating system model.
//!
//! Covers every system a legacy dllmap constraint can name, plus the
//! properties the loader layer needs from each: library file naming, the
//! search-path separator, and which loader ABI family opens libraries.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TargetError};

/// An operating system a native library can be loaded on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatingSystem {
    Linux,
    #[serde(alias = "osx")]
    MacOS,
    Windows,
    FreeBSD,
    OpenBSD,
    NetBSD,
    Solaris,
    Aix,
    HpUx,
}

/// Loader ABI family used to open libraries and look up symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoaderFamily {
    /// `dlopen`/`dlsym` from libdl (Linux, macOS, Solaris, AIX, HP-UX).
    Posix,
    /// `dlopen`/`dlsym` exported directly from the BSD libc.
    BsdLibc,
    /// `LoadLibrary`/`GetProcAddress` from kernel32.
    Windows,
}

impl OperatingSystem {
    /// Every known operating system, in declaration order.
    pub const ALL: [OperatingSystem; 9] = [
        OperatingSystem::Linux,
        OperatingSystem::MacOS,
        OperatingSystem::Windows,
        OperatingSystem::FreeBSD,
        OperatingSystem::OpenBSD,
        OperatingSystem::NetBSD,
        OperatingSystem::Solaris,
        OperatingSystem::Aix,
        OperatingSystem::HpUx,
    ];

    /// Detect the operating system of the running process.
    pub fn detect() -> Result<Self> {
        let os = std::env::consts::OS;
        match os {
            "linux" | "android" => Ok(Self::Linux),
            "macos" | "ios" => Ok(Self::MacOS),
            "windows" => Ok(Self::Windows),
            "freebsd" | "dragonfly" => Ok(Self::FreeBSD),
            "openbsd" => Ok(Self::OpenBSD),
            "netbsd" => Ok(Self::NetBSD),
            "solaris" | "illumos" => Ok(Self::Solaris),
            "aix" => Ok(Self::Aix),
            other => Err(TargetError::PlatformNotSupported {
                detail: format!("couldn't detect platform: {other}"),
            }),
        }
    }

    /// Parse an operating system name, case-insensitively.
    ///
    /// Accepts the dllmap spellings (`osx`, `hpux`) as well as common aliases.
    pub fn parse(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "linux" => Ok(Self::Linux),
            "osx" | "macos" | "darwin" => Ok(Self::MacOS),
            "windows" | "win32" => Ok(Self::Windows),
            "freebsd" => Ok(Self::FreeBSD),
            "openbsd" => Ok(Self::OpenBSD),
            "netbsd" => Ok(Self::NetBSD),
            "solaris" => Ok(Self::Solaris),
            "aix" => Ok(Self::Aix),
            "hpux" | "hp_ux" => Ok(Self::HpUx),
            _ => Err(TargetError::UnknownComponent {
                component: "operating system",
                value: name.to_string(),
            }),
        }
    }

    /// The loader family used on this system.
    pub fn loader_family(self) -> LoaderFamily {
        match self {
            Self::Windows => LoaderFamily::Windows,
            Self::FreeBSD | Self::OpenBSD | Self::NetBSD => LoaderFamily::BsdLibc,
            _ => LoaderFamily::Posix,
        }
    }

    /// Whether this is a Unix-like system.
    pub fn is_unix(self) -> bool {
        !matches!(self, Self::Windows)
    }

    /// Whether this system uses the BSD loader search order.
    pub fn is_bsd(self) -> bool {
        matches!(self, Self::FreeBSD | Self::OpenBSD | Self::NetBSD)
    }

    /// File suffix of shared libraries (".so", ".dylib", ".dll").
    pub fn library_suffix(self) -> &'static str {
        match self {
            Self::Windows => ".dll",
            Self::MacOS => ".dylib",
            _ => ".so",
        }
    }

    /// File prefix of shared libraries ("lib", or empty on Windows).
    pub fn library_prefix(self) -> &'static str {
        match self {
            Self::Windows => "",
            _ => "lib",
        }
    }

    /// Separator used in search-path environment variables.
    pub fn path_list_separator(self) -> char {
        match self {
            Self::Windows => ';',
            _ => ':',
        }
    }

    /// Canonical lowercase name, as written in dllmap files.
    pub fn config_name(self) -> &'static str {
        match self {
            Self::Linux => "linux",
            Self::MacOS => "osx",
            Self::Windows => "windows",
            Self::FreeBSD => "freebsd",
            Self::OpenBSD => "openbsd",
            Self::NetBSD => "netbsd",
            Self::Solaris => "solaris",
            Self::Aix => "aix",
            Self::HpUx => "hpux",
        }
    }
}

impl fmt::Display for OperatingSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.config_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!(OperatingSystem::parse("Linux").unwrap(), OperatingSystem::Linux);
        assert_eq!(OperatingSystem::parse("OSX").unwrap(), OperatingSystem::MacOS);
        assert_eq!(OperatingSystem::parse("hp-ux").unwrap(), OperatingSystem::HpUx);
        assert!(OperatingSystem::parse("beos").is_err());
    }

    #[test]
    fn loader_families() {
        assert_eq!(OperatingSystem::Linux.loader_family(), LoaderFamily::Posix);
        assert_eq!(OperatingSystem::MacOS.loader_family(), LoaderFamily::Posix);
        assert_eq!(OperatingSystem::OpenBSD.loader_family(), LoaderFamily::BsdLibc);
        assert_eq!(OperatingSystem::Windows.loader_family(), LoaderFamily::Windows);
    }

    #[test]
    fn library_naming() {
        assert_eq!(OperatingSystem::Linux.library_suffix(), ".so");
        assert_eq!(OperatingSystem::MacOS.library_suffix(), ".dylib");
        assert_eq!(OperatingSystem::Windows.library_suffix(), ".dll");
        assert_eq!(OperatingSystem::Windows.library_prefix(), "");
        assert_eq!(OperatingSystem::FreeBSD.library_prefix(), "lib");
    }

    #[test]
    fn config_names_round_trip() {
        for os in OperatingSystem::ALL {
            assert_eq!(OperatingSystem::parse(os.config_name()).unwrap(), os);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn detect_linux() {
        assert_eq!(OperatingSystem::detect().unwrap(), OperatingSystem::Linux);
    }
}
