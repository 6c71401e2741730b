use derive_more::derive::Display;
use itertools::Itertools;

use crate::{CpuSelection, CpuSet, Error, GroupId, Result};

const CPU_SET_KEYWORD: &str = "cpu-set";
const CPU_SELECTION_KEYWORD: &str = "cpu-selection";

/// An accept set and a reject set over the identifiers of one scope.
///
/// An identifier passes the filter if it is in the accept set and not in the reject set. By
/// default everything is accepted and nothing is rejected.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FilterPair {
    accept: CpuSet,
    reject: CpuSet,
}

impl FilterPair {
    /// A filter that lets every identifier pass.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            accept: CpuSet::full(),
            reject: CpuSet::new(),
        }
    }

    /// Narrows the accept set to identifiers also present in `set`.
    pub fn accept_only(&mut self, set: &CpuSet) {
        self.accept.intersect_with(set);
    }

    /// Adds every identifier of `set` to the reject set.
    pub fn reject(&mut self, set: &CpuSet) {
        self.reject.union_with(set);
    }

    /// Whether a processor with this identifier is to be excluded.
    ///
    /// An unknown identifier is never rejected.
    #[must_use]
    pub fn rejects(&self, id: Option<GroupId>) -> bool {
        id.is_some_and(|id| self.reject.contains(id) || !self.accept.contains(id))
    }

    /// Identifiers that may pass.
    #[must_use]
    pub const fn accepted(&self) -> &CpuSet {
        &self.accept
    }

    /// Identifiers that never pass.
    #[must_use]
    pub const fn rejected(&self) -> &CpuSet {
        &self.reject
    }
}

impl Default for FilterPair {
    fn default() -> Self {
        Self::new()
    }
}

/// What kind of identifier a [`FilterPair`] applies to.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "mirroring the identifier kinds accepted by cpu-set directives"
)]
pub enum FilterScope {
    /// Operating system processor index.
    #[display("cpu")]
    Cpu,

    /// NUMA node.
    #[display("node")]
    Node,

    /// Cluster, numbered within its package and node.
    #[display("cluster")]
    Cluster,

    /// Core, numbered within its package and node.
    #[display("core")]
    Core,

    /// Hardware thread position within its core.
    #[display("thread")]
    Thread,
}

impl FilterScope {
    /// Every scope, in the order sub-directives are listed to operators.
    pub const ALL: [Self; 5] = [
        Self::Cpu,
        Self::Node,
        Self::Cluster,
        Self::Core,
        Self::Thread,
    ];

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|scope| scope.to_string() == name)
    }

    // How the set is named in error messages.
    const fn set_noun(self) -> &'static str {
        match self {
            Self::Cpu => "CPU set",
            Self::Node => "node set",
            Self::Cluster => "cluster set",
            Self::Core => "core set",
            Self::Thread => "thread set",
        }
    }
}

/// Operator-configured processor filters, built from `cpu-set` directives.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CpuSetConfig {
    reset: bool,
    cpus: FilterPair,
    nodes: FilterPair,
    clusters: FilterPair,
    cores: FilterPair,
    threads: FilterPair,
}

impl CpuSetConfig {
    /// Whether the affinity inherited by the process is to be ignored.
    #[must_use]
    pub const fn is_reset(&self) -> bool {
        self.reset
    }

    /// Ignores the affinity inherited by the process, making every processor eligible.
    pub const fn set_reset(&mut self) {
        self.reset = true;
    }

    /// The filter for one scope.
    #[must_use]
    pub const fn filter(&self, scope: FilterScope) -> &FilterPair {
        match scope {
            FilterScope::Cpu => &self.cpus,
            FilterScope::Node => &self.nodes,
            FilterScope::Cluster => &self.clusters,
            FilterScope::Core => &self.cores,
            FilterScope::Thread => &self.threads,
        }
    }

    /// Mutable access to the filter for one scope.
    pub const fn filter_mut(&mut self, scope: FilterScope) -> &mut FilterPair {
        match scope {
            FilterScope::Cpu => &mut self.cpus,
            FilterScope::Node => &mut self.nodes,
            FilterScope::Cluster => &mut self.clusters,
            FilterScope::Core => &mut self.cores,
            FilterScope::Thread => &mut self.threads,
        }
    }

    /// Applies one tokenized `cpu-set` directive, keyword included.
    ///
    /// Sub-directives are `reset` and `only-<scope>`/`drop-<scope>` followed by a cpulist value,
    /// for the scopes `cpu`, `node`, `cluster`, `core` and `thread`. Several may be combined in
    /// one directive and repeated directives accumulate.
    ///
    /// The configuration is left untouched if any part of the directive is invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no sub-directive, a sub-directive is unknown, its value is
    /// missing or the value is not a valid cpulist.
    pub fn apply_directive(&mut self, args: &[&str]) -> Result<()> {
        let (keyword, sub_directives) = args.split_first().unwrap_or((&CPU_SET_KEYWORD, &[]));

        if sub_directives.is_empty() {
            return Err(Error::MissingArgument {
                directive: (*keyword).to_string(),
                expected: format!(
                    "a directive and an optional value ({})",
                    supported_sub_directives()
                ),
            });
        }

        let mut updated = self.clone();
        let mut remaining = sub_directives.iter();

        while let Some(&sub_directive) = remaining.next() {
            if sub_directive == "reset" {
                updated.set_reset();
                continue;
            }

            let invalid = |problem: String| Error::InvalidDirective {
                directive: (*keyword).to_string(),
                token: sub_directive.to_string(),
                problem,
            };

            let Some((action, scope)) = sub_directive
                .split_once('-')
                .and_then(|(action, scope)| Some((action, FilterScope::from_name(scope)?)))
                .filter(|(action, _)| matches!(*action, "only" | "drop"))
            else {
                return Err(invalid(format!(
                    "unknown directive ({})",
                    supported_sub_directives()
                )));
            };

            let Some(&value) = remaining.next() else {
                return Err(invalid(format!("missing {}", scope.set_noun())));
            };

            let set = CpuSet::from_cpulist(value).map_err(|error| {
                invalid(format!("invalid {} '{value}': {error}", scope.set_noun()))
            })?;

            if action == "drop" {
                updated.filter_mut(scope).reject(&set);
            } else {
                updated.filter_mut(scope).accept_only(&set);
            }
        }

        *self = updated;
        Ok(())
    }
}

fn supported_sub_directives() -> String {
    let names = std::iter::once("'reset'".to_string())
        .chain(
            FilterScope::ALL
                .iter()
                .flat_map(|scope| [format!("'only-{scope}'"), format!("'drop-{scope}'")]),
        )
        .join(", ");

    format!("only {names} supported")
}

/// Everything the operator can configure about processor topology handling.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TopologyConfig {
    cpu_set: CpuSetConfig,
    selection: CpuSelection,
}

impl TopologyConfig {
    /// A configuration with no filters and the default selection strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The processor filters.
    #[must_use]
    pub const fn cpu_set(&self) -> &CpuSetConfig {
        &self.cpu_set
    }

    /// Mutable access to the processor filters.
    pub const fn cpu_set_mut(&mut self) -> &mut CpuSetConfig {
        &mut self.cpu_set
    }

    /// The selection strategy the usable processors are ordered by.
    #[must_use]
    pub const fn selection(&self) -> CpuSelection {
        self.selection
    }

    /// Replaces the selection strategy.
    pub const fn set_selection(&mut self, selection: CpuSelection) {
        self.selection = selection;
    }

    /// Applies one already-tokenized configuration directive: `args[0]` is the keyword
    /// (`cpu-set` or `cpu-selection`), the rest are its arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyword is not handled here or its arguments are invalid. The
    /// configuration is left untouched in that case.
    ///
    /// # Example
    ///
    /// ```
    /// use cpu_topo::{CpuSelection, FilterScope, TopologyConfig};
    ///
    /// let mut config = TopologyConfig::new();
    /// config.apply_directive(&["cpu-set", "drop-cpu", "2-3"]).unwrap();
    /// config.apply_directive(&["cpu-selection", "low-latency"]).unwrap();
    ///
    /// assert!(config.cpu_set().filter(FilterScope::Cpu).rejects(Some(2)));
    /// assert_eq!(config.selection(), CpuSelection::LowLatency);
    /// ```
    pub fn apply_directive(&mut self, args: &[&str]) -> Result<()> {
        match args.first().copied() {
            Some(CPU_SET_KEYWORD) => self.cpu_set.apply_directive(args),
            Some(CPU_SELECTION_KEYWORD) => {
                self.selection = parse_selection(args)?;
                Ok(())
            }
            other => Err(Error::UnknownKeyword {
                keyword: other.unwrap_or_default().to_string(),
            }),
        }
    }
}

fn parse_selection(args: &[&str]) -> Result<CpuSelection> {
    match args {
        [keyword, name] => {
            CpuSelection::from_name(name).ok_or_else(|| Error::UnknownSelection {
                directive: (*keyword).to_string(),
                name: (*name).to_string(),
                supported: CpuSelection::supported_names(),
            })
        }
        [keyword, _, extra, ..] => Err(Error::InvalidDirective {
            directive: (*keyword).to_string(),
            token: (*extra).to_string(),
            problem: "takes exactly one argument".to_string(),
        }),
        _ => Err(Error::MissingArgument {
            directive: CPU_SELECTION_KEYWORD.to_string(),
            expected: format!(
                "exactly one strategy name, supported values are: {}",
                CpuSelection::supported_names()
            ),
        }),
    }
}
