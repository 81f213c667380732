//! Counter delta detection
//!
//! Compares the current [`Snapshot`] with the last persisted one and reports
//! every asic group whose error counter went up. Comparison is strictly per
//! `(module, group)`; a counter that went down was cleared by an operator and
//! counts as healthy.

use crate::snapshot::Snapshot;
use serde::Serialize;
use std::fmt;

/// A group whose error counter increased between two runs
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Regression {
    pub module: String,
    pub group: String,
    pub old_count: u64,
    pub new_count: u64,
}

impl Regression {
    /// Number of errors added since the previous run
    pub fn delta(&self) -> u64 {
        self.new_count.saturating_sub(self.old_count)
    }
}

impl fmt::Display for Regression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "module {} group {}: {} -> {}",
            self.module, self.group, self.old_count, self.new_count
        )
    }
}

/// Result of comparing two snapshots
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// No previous state existed; this run only seeds the store
    ColdStart,
    /// Previous state was available and compared
    Compared {
        /// Groups whose counter increased, sorted by module then group
        regressions: Vec<Regression>,
        /// `(module, group)` pairs with no previous value to compare against
        unbaselined: Vec<(String, String)>,
    },
}

impl Detection {
    /// Regressions found (always empty on cold start)
    pub fn regressions(&self) -> &[Regression] {
        match self {
            Detection::ColdStart => &[],
            Detection::Compared { regressions, .. } => regressions,
        }
    }

    /// Pairs that had no baseline (always empty on cold start)
    pub fn unbaselined(&self) -> &[(String, String)] {
        match self {
            Detection::ColdStart => &[],
            Detection::Compared { unbaselined, .. } => unbaselined,
        }
    }

    /// Check if this was a cold start
    pub fn is_cold_start(&self) -> bool {
        matches!(self, Detection::ColdStart)
    }

    /// Previous count for a flagged pair
    pub fn previous_count(&self, module: &str, group: &str) -> Option<u64> {
        self.regressions()
            .iter()
            .find(|r| r.module == module && r.group == group)
            .map(|r| r.old_count)
    }
}

/// Compare `current` against `previous`.
///
/// Output order follows the snapshot's sorted module and group ids, so it is
/// identical for identical inputs.
pub fn detect(current: &Snapshot, previous: Option<&Snapshot>) -> Detection {
    let Some(previous) = previous else {
        return Detection::ColdStart;
    };

    let mut regressions = Vec::new();
    let mut unbaselined = Vec::new();

    for (module, group, new_count) in current.entries() {
        match previous.count(module, group) {
            Some(old_count) if new_count > old_count => regressions.push(Regression {
                module: module.to_string(),
                group: group.to_string(),
                old_count,
                new_count,
            }),
            Some(_) => {}
            None => unbaselined.push((module.to_string(), group.to_string())),
        }
    }

    Detection::Compared {
        regressions,
        unbaselined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::CounterObservation;

    fn snapshot(modules: &[(&str, Vec<(&str, &str)>)]) -> Snapshot {
        modules
            .iter()
            .fold(Snapshot::builder(), |builder, (module, groups)| {
                let obs: Vec<_> = groups
                    .iter()
                    .map(|(g, c)| CounterObservation::new(*g, *c))
                    .collect();
                builder.module(module, &obs)
            })
            .build()
    }

    #[test]
    fn test_cold_start_has_no_regressions() {
        let current = snapshot(&[("7", vec![("X", "10")])]);
        let detection = detect(&current, None);

        assert!(detection.is_cold_start());
        assert!(detection.regressions().is_empty());
        assert!(detection.unbaselined().is_empty());
    }

    #[test]
    fn test_increment_is_flagged() {
        let previous = snapshot(&[("3", vec![("A", "100")])]);
        let current = snapshot(&[("3", vec![("A", "150"), ("B", "5")])]);

        let detection = detect(&current, Some(&previous));

        assert_eq!(
            detection.regressions(),
            &[Regression {
                module: "3".to_string(),
                group: "A".to_string(),
                old_count: 100,
                new_count: 150,
            }]
        );
        assert_eq!(
            detection.unbaselined(),
            &[("3".to_string(), "B".to_string())]
        );
        assert_eq!(detection.regressions()[0].delta(), 50);
        assert_eq!(detection.previous_count("3", "A"), Some(100));
    }

    #[test]
    fn test_delta_never_underflows() {
        let cleared = Regression {
            module: "3".to_string(),
            group: "A".to_string(),
            old_count: 5,
            new_count: 1,
        };
        assert_eq!(cleared.delta(), 0);
    }

    #[test]
    fn test_equal_or_lower_is_healthy() {
        let previous = snapshot(&[("3", vec![("A", "100"), ("B", "40")])]);
        let current = snapshot(&[("3", vec![("A", "100"), ("B", "0")])]);

        let detection = detect(&current, Some(&previous));

        assert!(!detection.is_cold_start());
        assert!(detection.regressions().is_empty());
    }

    #[test]
    fn test_groups_compared_independently() {
        let previous = snapshot(&[("3", vec![("0", "5"), ("1", "5")])]);
        let current = snapshot(&[("3", vec![("0", "6"), ("1", "5")])]);

        let detection = detect(&current, Some(&previous));

        assert_eq!(detection.previous_count("3", "0"), Some(5));
        assert_eq!(detection.previous_count("3", "1"), None);
    }

    #[test]
    fn test_previous_no_data_module_has_no_baseline() {
        let previous = Snapshot::builder().no_data("4").build();
        let current = snapshot(&[("4", vec![("0", "9")])]);

        let detection = detect(&current, Some(&previous));

        assert!(detection.regressions().is_empty());
        assert_eq!(detection.unbaselined().len(), 1);
    }

    #[test]
    fn test_current_no_data_module_is_skipped() {
        let previous = snapshot(&[("4", vec![("0", "9")])]);
        let current = Snapshot::builder().no_data("4").build();

        let detection = detect(&current, Some(&previous));

        assert!(detection.regressions().is_empty());
        assert!(detection.unbaselined().is_empty());
    }

    #[test]
    fn test_output_sorted_by_module_then_group() {
        let previous = snapshot(&[
            ("9", vec![("b", "0"), ("a", "0")]),
            ("10", vec![("z", "0")]),
        ]);
        let current = snapshot(&[
            ("10", vec![("z", "1")]),
            ("9", vec![("a", "1"), ("b", "1")]),
        ]);

        let detection = detect(&current, Some(&previous));
        let pairs: Vec<_> = detection
            .regressions()
            .iter()
            .map(|r| (r.module.as_str(), r.group.as_str()))
            .collect();

        assert_eq!(pairs, vec![("10", "z"), ("9", "a"), ("9", "b")]);
    }
}
