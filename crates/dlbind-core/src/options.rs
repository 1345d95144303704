//! Binding option flags.

use bitflags::bitflags;

bitflags! {
    /// Options selected when a contract is bound to a library.
    ///
    /// Instances bound with different option sets never share an
    /// implementation form.
    #[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Debug)]
    pub struct ImplementationOptions: u32 {
        /// Resolve each symbol on first call rather than at bind time.
        const USE_LAZY_BINDING = 1 << 0;
        /// Fail calls made after the instance has been disposed.
        const GENERATE_DISPOSAL_CHECKS = 1 << 1;
        /// Apply dllmap library and symbol redirection.
        const ENABLE_DLL_MAP_SUPPORT = 1 << 2;
        /// Call through the raw symbol address instead of a function object.
        const USE_INDIRECT_CALLS = 1 << 3;
        /// Accepted for compatibility; has no effect on binding.
        const SUPPRESS_SECURITY = 1 << 4;
        /// Accepted for compatibility; has no effect on binding.
        const ENABLE_OPTIMIZATIONS = 1 << 5;
    }
}

impl ImplementationOptions {
    /// Short names of the set flags, for logs and reports.
    pub fn names(self) -> Vec<&'static str> {
        self.iter_names().map(|(name, _)| name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_empty() {
        assert!(ImplementationOptions::default().is_empty());
    }

    #[test]
    fn bit_values_are_fixed() {
        assert_eq!(ImplementationOptions::USE_LAZY_BINDING.bits(), 1);
        assert_eq!(ImplementationOptions::USE_INDIRECT_CALLS.bits(), 8);
        assert_eq!(ImplementationOptions::ENABLE_OPTIMIZATIONS.bits(), 32);
    }

    #[test]
    fn names_list_set_flags() {
        let options = ImplementationOptions::USE_LAZY_BINDING
            | ImplementationOptions::GENERATE_DISPOSAL_CHECKS;
        assert_eq!(
            options.names(),
            vec!["USE_LAZY_BINDING", "GENERATE_DISPOSAL_CHECKS"]
        );
    }
}
