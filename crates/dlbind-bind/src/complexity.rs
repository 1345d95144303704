//! Generator complexity flags and pipeline ordering.

use bitflags::bitflags;

bitflags! {
    /// What a pipeline stage does to a work unit.
    ///
    /// Stages run in descending order of [`score`](Self::score); terminating
    /// stages always run after every non-terminating one.
    #[derive(Copy, Clone, Default, Eq, PartialEq, Hash, Debug)]
    pub struct GeneratorComplexity: u32 {
        /// Rewrites the parameter or return types of the unit.
        const TRANSFORMS_PARAMETERS = 1 << 0;
        /// Only applies to some members, based on their declaration.
        const MEMBER_DEPENDENT = 1 << 1;
        /// Only applies under some implementation options.
        const OPTION_DEPENDENT = 1 << 2;
        /// Emits a final binding instead of replacement units.
        const TERMINATING = 1 << 3;
        /// Synthesizes new bound instances.
        const CREATES_TYPES = 1 << 4;
        /// Produces its binding on first call rather than at bind time.
        const DEFERRED_IMPLEMENTATION = 1 << 5;
    }
}

impl GeneratorComplexity {
    /// Number of flags set, not counting `TERMINATING`.
    pub fn score(self) -> u32 {
        self.difference(Self::TERMINATING).bits().count_ones()
    }

    pub fn is_terminating(self) -> bool {
        self.contains(Self::TERMINATING)
    }
}

/// Stable order for a stage list: descending score, terminating stages last.
pub fn sort_by_complexity<T>(stages: &mut [T], complexity: impl Fn(&T) -> GeneratorComplexity) {
    stages.sort_by_key(|stage| {
        let c = complexity(stage);
        (c.is_terminating(), std::cmp::Reverse(c.score()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn terminating_is_not_scored() {
        let c = GeneratorComplexity::MEMBER_DEPENDENT | GeneratorComplexity::TERMINATING;
        assert_eq!(c.score(), 1);
        assert_eq!(GeneratorComplexity::TERMINATING.score(), 0);
    }

    #[test]
    fn terminating_stages_sort_last() {
        let mut stages = vec![
            ("delegate", GeneratorComplexity::TERMINATING),
            ("disposal", GeneratorComplexity::OPTION_DEPENDENT),
            (
                "indirect",
                GeneratorComplexity::OPTION_DEPENDENT | GeneratorComplexity::TERMINATING,
            ),
            (
                "boolean",
                GeneratorComplexity::MEMBER_DEPENDENT | GeneratorComplexity::TRANSFORMS_PARAMETERS,
            ),
            ("generic", GeneratorComplexity::all().difference(GeneratorComplexity::TERMINATING)),
        ];
        sort_by_complexity(&mut stages, |s| s.1);
        let names: Vec<_> = stages.iter().map(|s| s.0).collect();
        assert_eq!(names, ["generic", "boolean", "disposal", "indirect", "delegate"]);
    }

    #[test]
    fn equal_scores_keep_registration_order() {
        let mut stages = vec![
            ("first", GeneratorComplexity::MEMBER_DEPENDENT),
            ("second", GeneratorComplexity::OPTION_DEPENDENT),
            ("third", GeneratorComplexity::CREATES_TYPES),
        ];
        sort_by_complexity(&mut stages, |s| s.1);
        let names: Vec<_> = stages.iter().map(|s| s.0).collect();
        assert_eq!(names, ["first", "second", "third"]);
    }

    proptest! {
        #[test]
        fn sorted_order_is_monotone(bits in proptest::collection::vec(0u32..64, 0..12)) {
            let mut stages: Vec<GeneratorComplexity> =
                bits.into_iter().map(GeneratorComplexity::from_bits_truncate).collect();
            sort_by_complexity(&mut stages, |c| *c);
            for pair in stages.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                prop_assert!(a.is_terminating() <= b.is_terminating());
                if a.is_terminating() == b.is_terminating() {
                    prop_assert!(a.score() >= b.score());
                }
            }
        }
    }
}
