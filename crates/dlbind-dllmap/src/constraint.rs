//! Platform constraint sets.
//!
//! A constraint attribute is a comma-separated list of values, optionally
//! negated with a leading `!`. An absent or blank attribute matches
//! everything; unknown values are ignored.

use bitflags::bitflags;
use dlbind_targets::{Architecture, OperatingSystem, Platform, WordSize};

bitflags! {
    /// A set of operating systems.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct OsSet: u32 {
        const LINUX = 1 << 0;
        const OSX = 1 << 1;
        const SOLARIS = 1 << 2;
        const FREEBSD = 1 << 3;
        const OPENBSD = 1 << 4;
        const NETBSD = 1 << 5;
        const WINDOWS = 1 << 6;
        const AIX = 1 << 7;
        const HPUX = 1 << 8;
    }
}

bitflags! {
    /// A set of processor architectures.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct ArchSet: u32 {
        const X86 = 1 << 0;
        const X86_64 = 1 << 1;
        const SPARC = 1 << 2;
        const PPC = 1 << 3;
        const S390 = 1 << 4;
        const S390X = 1 << 5;
        const ARM = 1 << 6;
        const ARMV8 = 1 << 7;
        const MIPS = 1 << 8;
        const ALPHA = 1 << 9;
        const HPPA = 1 << 10;
        const IA64 = 1 << 11;
    }
}

bitflags! {
    /// A set of word sizes.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct WordSizeSet: u32 {
        const WORD32 = 1 << 0;
        const WORD64 = 1 << 1;
    }
}

/// A constraint set parsed from a dllmap attribute.
pub trait Constraint: Copy + Sized {
    /// Every value.
    fn everything() -> Self;

    /// No value.
    fn nothing() -> Self;

    /// Parse a single token; `None` for unknown tokens.
    fn from_token(token: &str) -> Option<Self>;

    /// Set union.
    fn merge(self, other: Self) -> Self;

    /// Every value not in this set.
    fn invert(self) -> Self;
}

macro_rules! impl_constraint {
    ($set:ty) => {
        impl Constraint for $set {
            fn everything() -> Self {
                Self::all()
            }

            fn nothing() -> Self {
                Self::empty()
            }

            fn from_token(token: &str) -> Option<Self> {
                Self::from_config_token(token)
            }

            fn merge(self, other: Self) -> Self {
                self | other
            }

            fn invert(self) -> Self {
                !self
            }
        }
    };
}

impl_constraint!(OsSet);
impl_constraint!(ArchSet);
impl_constraint!(WordSizeSet);

/// Parse a constraint attribute into a set.
pub fn parse_constraint<T: Constraint>(content: Option<&str>) -> T {
    let content = match content.map(str::trim) {
        None | Some("") => return T::everything(),
        Some(content) => content.replace('-', "_"),
    };

    let (inverse, body) = match content.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, content.as_str()),
    };

    let parsed = body
        .split(',')
        .filter_map(|token| T::from_token(token.trim()))
        .fold(T::nothing(), T::merge);

    if inverse {
        parsed.invert()
    } else {
        parsed
    }
}

impl OsSet {
    fn from_config_token(token: &str) -> Option<Self> {
        OperatingSystem::parse(token).ok().map(Self::from)
    }
}

impl From<OperatingSystem> for OsSet {
    fn from(os: OperatingSystem) -> Self {
        match os {
            OperatingSystem::Linux => Self::LINUX,
            OperatingSystem::MacOS => Self::OSX,
            OperatingSystem::Windows => Self::WINDOWS,
            OperatingSystem::FreeBSD => Self::FREEBSD,
            OperatingSystem::OpenBSD => Self::OPENBSD,
            OperatingSystem::NetBSD => Self::NETBSD,
            OperatingSystem::Solaris => Self::SOLARIS,
            OperatingSystem::Aix => Self::AIX,
            OperatingSystem::HpUx => Self::HPUX,
        }
    }
}

impl ArchSet {
    fn from_config_token(token: &str) -> Option<Self> {
        Architecture::parse(token).ok().map(Self::from)
    }
}

impl From<Architecture> for ArchSet {
    fn from(arch: Architecture) -> Self {
        match arch {
            Architecture::X86 => Self::X86,
            Architecture::X86_64 => Self::X86_64,
            Architecture::Sparc => Self::SPARC,
            Architecture::PowerPc => Self::PPC,
            Architecture::S390 => Self::S390,
            Architecture::S390x => Self::S390X,
            Architecture::Arm => Self::ARM,
            Architecture::ArmV8 => Self::ARMV8,
            Architecture::Mips => Self::MIPS,
            Architecture::Alpha => Self::ALPHA,
            Architecture::Hppa => Self::HPPA,
            Architecture::Ia64 => Self::IA64,
        }
    }
}

impl WordSizeSet {
    fn from_config_token(token: &str) -> Option<Self> {
        WordSize::parse(token).ok().map(Self::from)
    }
}

impl From<WordSize> for WordSizeSet {
    fn from(word: WordSize) -> Self {
        match word {
            WordSize::Word32 => Self::WORD32,
            WordSize::Word64 => Self::WORD64,
        }
    }
}

/// The three constraint sets of one mapping node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformConstraint {
    pub os: OsSet,
    pub cpu: ArchSet,
    pub word_size: WordSizeSet,
}

impl PlatformConstraint {
    /// Parse the three raw attributes.
    pub fn parse(os: Option<&str>, cpu: Option<&str>, word_size: Option<&str>) -> Self {
        Self {
            os: parse_constraint(os),
            cpu: parse_constraint(cpu),
            word_size: parse_constraint(word_size),
        }
    }

    /// Whether a platform satisfies all three sets.
    pub fn matches(&self, platform: &Platform) -> bool {
        self.os.contains(OsSet::from(platform.os))
            && self.cpu.contains(ArchSet::from(platform.arch))
            && self.word_size.contains(WordSizeSet::from(platform.word_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_matches_everything() {
        assert_eq!(parse_constraint::<OsSet>(None), OsSet::all());
        assert_eq!(parse_constraint::<OsSet>(Some("  ")), OsSet::all());
    }

    #[test]
    fn list_is_case_insensitive() {
        let set: OsSet = parse_constraint(Some("Linux,OSX"));
        assert_eq!(set, OsSet::LINUX | OsSet::OSX);
    }

    #[test]
    fn negation_inverts() {
        let set: OsSet = parse_constraint(Some("!windows"));
        assert!(!set.contains(OsSet::WINDOWS));
        assert!(set.contains(OsSet::LINUX));
        assert!(set.contains(OsSet::HPUX));
    }

    #[test]
    fn unknown_values_are_ignored() {
        let set: ArchSet = parse_constraint(Some("x86,z80,x86-64"));
        assert_eq!(set, ArchSet::X86 | ArchSet::X86_64);
    }

    #[test]
    fn word_size_numbers() {
        let set: WordSizeSet = parse_constraint(Some("32"));
        assert_eq!(set, WordSizeSet::WORD32);
        let set: WordSizeSet = parse_constraint(Some("!32"));
        assert_eq!(set, WordSizeSet::WORD64);
    }

    #[test]
    fn platform_constraint_matching() {
        let c = PlatformConstraint::parse(Some("linux"), Some("x86_64,armv8"), None);
        assert!(c.matches(&Platform::linux_x86_64()));
        assert!(c.matches(&Platform::linux_aarch64()));
        assert!(!c.matches(&Platform::windows_x86_64()));
    }
}
