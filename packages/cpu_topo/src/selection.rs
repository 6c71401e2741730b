use std::fmt::{self, Display};

use itertools::Itertools;

use crate::CpuOrdering;

/// How the usable processors are ordered before they are handed to the thread group consumer,
/// selected by name with the `cpu-selection` directive.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "mirroring the names accepted by the cpu-selection directive"
)]
pub enum CpuSelection {
    /// Biggest processors first, grouped by locality.
    #[default]
    Balanced,

    /// Maximized processor performance.
    Performance,

    /// Minimized latency between the selected processors.
    LowLatency,

    /// Locality only.
    Locality,

    /// Lowest resource usage.
    Resource,

    /// Every available processor in the order the system numbers them.
    All,
}

impl CpuSelection {
    /// Every strategy, in the order they are listed to operators. The first one is the default.
    pub const ALL: [Self; 6] = [
        Self::Balanced,
        Self::Performance,
        Self::LowLatency,
        Self::Locality,
        Self::Resource,
        Self::All,
    ];

    /// The name used to select the strategy in configuration.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Performance => "performance",
            Self::LowLatency => "low-latency",
            Self::Locality => "locality",
            Self::Resource => "resource",
            Self::All => "all",
        }
    }

    /// One-line description for operators.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Balanced => "Use biggest CPUs grouped by locality first",
            Self::Performance => "Optimize for maximized CPU performance",
            Self::LowLatency => "Optimize for minimized CPU latency",
            Self::Locality => "Arrange by locality only",
            Self::Resource => "Lowest resource usage",
            Self::All => "Use all available CPUs in the system's order",
        }
    }

    /// The ordering this strategy sorts the topology by.
    #[must_use]
    pub const fn ordering(self) -> CpuOrdering {
        match self {
            Self::Balanced => CpuOrdering::Balanced,
            Self::Performance => CpuOrdering::Performance,
            Self::LowLatency => CpuOrdering::LowLatency,
            Self::Locality => CpuOrdering::Locality,
            Self::Resource => CpuOrdering::Resource,
            Self::All => CpuOrdering::Index,
        }
    }

    /// Looks up a strategy by its configuration name. Names are case-sensitive.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|selection| selection.name() == name)
    }

    /// All names, quoted and joined for use in messages: `'a', 'b' and 'c'`.
    #[must_use]
    pub fn supported_names() -> String {
        let quoted = Self::ALL
            .iter()
            .map(|selection| format!("'{}'", selection.name()))
            .collect_vec();

        match quoted.split_last() {
            Some((last, [])) => last.clone(),
            Some((last, rest)) => format!("{} and {last}", rest.iter().join(", ")),
            None => String::new(),
        }
    }
}

impl Display for CpuSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn default_is_first_entry() {
        assert_eq!(CpuSelection::default(), CpuSelection::ALL[0]);
        assert_eq!(CpuSelection::default().name(), "balanced");
    }

    #[test]
    fn names_round_trip() {
        for selection in CpuSelection::ALL {
            assert_eq!(CpuSelection::from_name(selection.name()), Some(selection));
            assert_eq!(selection.to_string(), selection.name());
            assert!(!selection.description().is_empty());
        }

        assert_eq!(CpuSelection::from_name("Balanced"), None);
        assert_eq!(CpuSelection::from_name(""), None);
    }

    #[test]
    fn all_restores_system_order() {
        assert_eq!(CpuSelection::All.ordering(), CpuOrdering::Index);
        assert_eq!(
            CpuSelection::LowLatency.ordering(),
            CpuOrdering::LowLatency
        );
    }

    #[test]
    fn supported_names_reads_naturally() {
        assert_eq!(
            CpuSelection::supported_names(),
            "'balanced', 'performance', 'low-latency', 'locality', 'resource' and 'all'"
        );
    }
}
