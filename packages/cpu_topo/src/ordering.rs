//! Placement policies expressed as chains of sort keys.
//!
//! Every policy is a list of [`SortKey`]s compared in order until one of them tells two
//! descriptors apart. Unknown values never win: on every key, in either direction, a descriptor
//! with a known value sorts before one without.

use std::cmp::Ordering;

use derive_more::derive::Display;

use crate::{CACHE_LEVELS, Capacity, CpuDescriptor};
use SortKey::{Availability, Cluster, Core, Index, Node, Package, SiblingIndex};

/// Direction of a key whose preferred end depends on the policy.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "a key is either ascending or descending, there is no third way"
)]
pub enum SortDirection {
    /// Smallest known value first.
    Ascending,

    /// Largest known value first.
    Descending,
}

/// One link of a comparison chain.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "every descriptor field that a policy can order by has a key"
)]
pub enum SortKey {
    /// Processors that are neither excluded nor offline come first.
    Availability,

    /// Physical package, ascending.
    Package,

    /// NUMA node, ascending.
    Node,

    /// Cache instance at the given level (0 to 4), ascending.
    Cache(u8),

    /// Machine-wide cluster identifier, ascending.
    Cluster,

    /// Core (thread set) identifier, ascending.
    Core,

    /// Capacity with a 5% tolerance, see [`capacity_cmp()`].
    Capacity(SortDirection),

    /// Number of hardware threads of the core.
    SiblingCount(SortDirection),

    /// Position among the hardware threads of the core, ascending.
    SiblingIndex,

    /// Operating system processor index, ascending.
    Index,
}

impl SortKey {
    /// Compares two descriptors on this key alone.
    #[must_use]
    pub fn compare(self, l: &CpuDescriptor, r: &CpuDescriptor) -> Ordering {
        match self {
            Self::Availability => (!l.is_available()).cmp(&!r.is_available()),
            Self::Package => known_first(l.package_id, r.package_id, Ord::cmp),
            Self::Node => known_first(l.node_id, r.node_id, Ord::cmp),
            Self::Cache(level) => {
                let level = usize::from(level);
                known_first(l.cache_id(level), r.cache_id(level), Ord::cmp)
            }
            Self::Cluster => known_first(l.cluster_global_id, r.cluster_global_id, Ord::cmp),
            Self::Core => known_first(l.core_id, r.core_id, Ord::cmp),
            Self::Capacity(direction) => {
                known_first(l.capacity, r.capacity, |l, r| match direction {
                    SortDirection::Ascending => capacity_cmp(*l, *r),
                    SortDirection::Descending => capacity_cmp(*r, *l),
                })
            }
            Self::SiblingCount(direction) => {
                known_first(l.sibling_count, r.sibling_count, |l, r| match direction {
                    SortDirection::Ascending => l.cmp(r),
                    SortDirection::Descending => r.cmp(l),
                })
            }
            Self::SiblingIndex => known_first(l.sibling_index, r.sibling_index, Ord::cmp),
            Self::Index => l.os_index.cmp(&r.os_index),
        }
    }
}

// Known values compare with `cmp`, any known value sorts before an unknown one.
fn known_first<T>(l: Option<T>, r: Option<T>, cmp: impl FnOnce(&T, &T) -> Ordering) -> Ordering {
    match (l, r) {
        (Some(l), Some(r)) => cmp(&l, &r),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Compares two capacities, treating values within roughly 5% of each other as equal.
///
/// Returns [`Ordering::Greater`] if `l` is meaningfully bigger than `r`.
///
/// The tolerance makes this comparison non-transitive (100 equals 104 and 104 equals 108, yet
/// 100 is less than 108), so it must only be used with sorting algorithms that tolerate that.
///
/// # Example
///
/// ```
/// use std::cmp::Ordering;
///
/// use cpu_topo::capacity_cmp;
///
/// assert_eq!(capacity_cmp(100, 104), Ordering::Equal);
/// assert_eq!(capacity_cmp(106, 100), Ordering::Greater);
/// assert_eq!(capacity_cmp(100, 106), Ordering::Less);
/// ```
#[must_use]
pub fn capacity_cmp(l: Capacity, r: Capacity) -> Ordering {
    let (l, r) = (u64::from(l), u64::from(r));

    if l * 19 > r * 20 {
        Ordering::Greater
    } else if l * 20 < r * 19 {
        Ordering::Less
    } else {
        Ordering::Equal
    }
}

/// A total order over processor descriptors encoding one placement policy.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[expect(
    clippy::exhaustive_enums,
    reason = "one variant per comparison chain used by the selection strategies"
)]
pub enum CpuOrdering {
    /// Operating system index only. Restores the order the store was allocated in.
    #[display("index")]
    Index,

    /// Physically close processors are adjacent.
    #[display("locality")]
    Locality,

    /// Grouped by cluster first.
    #[display("cluster")]
    Cluster,

    /// Locality order that additionally splits clusters on capacity differences.
    #[display("cluster-capacity")]
    ClusterCapacity,

    /// Most capable processors first.
    #[display("performance")]
    Performance,

    /// Closest processors first, then the most capable among them.
    #[display("low-latency")]
    LowLatency,

    /// Most capable processors first, grouped by node.
    #[display("balanced")]
    Balanced,

    /// Least capable processors first.
    #[display("resource")]
    Resource,
}

const L0: SortKey = SortKey::Cache(0);
const L1: SortKey = SortKey::Cache(1);
const L2: SortKey = SortKey::Cache(2);
const L3: SortKey = SortKey::Cache(3);
const L4: SortKey = SortKey::Cache(4);

const _: () = assert!(CACHE_LEVELS == 5, "key chains below name every cache level");

const CAPACITY_DESC: SortKey = SortKey::Capacity(SortDirection::Descending);
const CAPACITY_ASC: SortKey = SortKey::Capacity(SortDirection::Ascending);
const SMT_DESC: SortKey = SortKey::SiblingCount(SortDirection::Descending);
const SMT_ASC: SortKey = SortKey::SiblingCount(SortDirection::Ascending);

const INDEX_KEYS: &[SortKey] = &[Index];

const LOCALITY_KEYS: &[SortKey] = &[
    Availability,
    Package,
    Node,
    L4,
    L3,
    Cluster,
    L2,
    Core,
    L1,
    L0,
    Index,
];

const CLUSTER_KEYS: &[SortKey] = &[Availability, Cluster, Package, Node, L3, L2, Index];

const CLUSTER_CAPACITY_KEYS: &[SortKey] = &[
    Availability,
    Package,
    Node,
    L4,
    L3,
    Cluster,
    CAPACITY_DESC,
    L2,
    Core,
    L1,
    L0,
    Index,
];

const PERFORMANCE_KEYS: &[SortKey] = &[
    Availability,
    CAPACITY_DESC,
    SMT_DESC,
    SiblingIndex,
    L0,
    L1,
    Core,
    L2,
    Cluster,
    L3,
    L4,
    Node,
    Package,
    Index,
];

const LOW_LATENCY_KEYS: &[SortKey] = &[
    Availability,
    Package,
    Node,
    L4,
    L3,
    CAPACITY_DESC,
    SMT_DESC,
    Cluster,
    L2,
    Core,
    L1,
    L0,
    Index,
];

const BALANCED_KEYS: &[SortKey] = &[
    Availability,
    CAPACITY_DESC,
    SMT_DESC,
    Package,
    Node,
    L4,
    L3,
    SiblingIndex,
    Cluster,
    L2,
    Core,
    L1,
    L0,
    Index,
];

const RESOURCE_KEYS: &[SortKey] = &[
    Availability,
    CAPACITY_ASC,
    SMT_ASC,
    Package,
    Node,
    L4,
    L3,
    Cluster,
    L2,
    Core,
    L1,
    L0,
    Index,
];

impl CpuOrdering {
    /// Every ordering, in no particular order.
    pub const ALL: [Self; 8] = [
        Self::Index,
        Self::Locality,
        Self::Cluster,
        Self::ClusterCapacity,
        Self::Performance,
        Self::LowLatency,
        Self::Balanced,
        Self::Resource,
    ];

    /// The chain of keys this ordering compares on, most significant first.
    #[must_use]
    pub const fn keys(self) -> &'static [SortKey] {
        match self {
            Self::Index => INDEX_KEYS,
            Self::Locality => LOCALITY_KEYS,
            Self::Cluster => CLUSTER_KEYS,
            Self::ClusterCapacity => CLUSTER_CAPACITY_KEYS,
            Self::Performance => PERFORMANCE_KEYS,
            Self::LowLatency => LOW_LATENCY_KEYS,
            Self::Balanced => BALANCED_KEYS,
            Self::Resource => RESOURCE_KEYS,
        }
    }

    /// Compares two descriptors under this ordering.
    #[must_use]
    pub fn compare(self, l: &CpuDescriptor, r: &CpuDescriptor) -> Ordering {
        compare_by_keys(l, r, self.keys())
    }

    /// Sorts descriptors in place under this ordering.
    ///
    /// The sort is stable: descriptors that compare equal keep their relative order.
    pub fn sort(self, cpus: &mut [CpuDescriptor]) {
        sort_by_keys(cpus, self.keys());
    }
}

pub(crate) fn compare_by_keys(l: &CpuDescriptor, r: &CpuDescriptor, keys: &[SortKey]) -> Ordering {
    keys.iter()
        .map(|key| key.compare(l, r))
        .find(|ordering| ordering.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Stable insertion sort.
///
/// The standard library sorts require a total order and may panic when given the non-transitive
/// capacity comparison. Insertion sort only ever compares neighbors and always terminates.
pub(crate) fn sort_by_keys(cpus: &mut [CpuDescriptor], keys: &[SortKey]) {
    for unsorted in 1..cpus.len() {
        let mut position = unsorted;

        while position > 0 && compare_by_keys(&cpus[position - 1], &cpus[position], keys).is_gt() {
            cpus.swap(position - 1, position);
            position -= 1;
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use itertools::Itertools;
    use static_assertions::{assert_impl_all, const_assert_eq};

    use super::*;

    assert_impl_all!(SortKey: Copy, Send, Sync);
    assert_impl_all!(CpuOrdering: Copy, Send, Sync);

    // Every variant, payload included, fits in the discriminant plus one byte.
    const_assert_eq!(size_of::<SortKey>(), 2);

    fn cpu(os_index: u32) -> CpuDescriptor {
        CpuDescriptor::unknown(os_index)
    }

    fn indexes(cpus: &[CpuDescriptor]) -> Vec<u32> {
        cpus.iter().map(CpuDescriptor::os_index).collect_vec()
    }

    #[test]
    fn capacity_tolerance() {
        assert_eq!(capacity_cmp(100, 104), Ordering::Equal);
        assert_eq!(capacity_cmp(104, 100), Ordering::Equal);
        assert_eq!(capacity_cmp(100, 106), Ordering::Less);
        assert_eq!(capacity_cmp(106, 100), Ordering::Greater);
        assert_eq!(capacity_cmp(0, 0), Ordering::Equal);
        assert_eq!(capacity_cmp(u32::MAX, u32::MAX), Ordering::Equal);
    }

    #[test]
    fn capacity_term_is_tolerant_in_every_capacity_aware_ordering() {
        let a = CpuDescriptor {
            capacity: Some(100),
            ..cpu(0)
        };
        let b = CpuDescriptor {
            capacity: Some(104),
            ..cpu(1)
        };
        let c = CpuDescriptor {
            capacity: Some(106),
            ..cpu(2)
        };

        for direction in [SortDirection::Ascending, SortDirection::Descending] {
            let key = SortKey::Capacity(direction);
            assert_eq!(key.compare(&a, &b), Ordering::Equal);
            assert_ne!(key.compare(&a, &c), Ordering::Equal);
        }

        for ordering in [
            CpuOrdering::ClusterCapacity,
            CpuOrdering::Performance,
            CpuOrdering::LowLatency,
            CpuOrdering::Balanced,
            CpuOrdering::Resource,
        ] {
            let capacity_key = ordering
                .keys()
                .iter()
                .copied()
                .find(|key| matches!(key, SortKey::Capacity(_)))
                .unwrap();

            assert_eq!(capacity_key.compare(&a, &b), Ordering::Equal, "{ordering}");
            assert_ne!(capacity_key.compare(&a, &c), Ordering::Equal, "{ordering}");
        }
    }

    #[test]
    fn cache_key_reads_its_level() {
        let mut l = cpu(0);
        let mut r = cpu(1);
        l.cache_ids[4] = Some(1);
        r.cache_ids[4] = Some(0);
        l.cache_ids[0] = Some(0);
        r.cache_ids[0] = Some(1);

        assert_eq!(L4.compare(&l, &r), Ordering::Greater);
        assert_eq!(L0.compare(&l, &r), Ordering::Less);
        assert_eq!(L2.compare(&l, &r), Ordering::Equal);
    }

    #[test]
    fn unknown_never_wins() {
        let known = CpuDescriptor {
            package_id: Some(9),
            node_id: Some(9),
            cache_ids: [Some(9); CACHE_LEVELS],
            cluster_global_id: Some(9),
            core_id: Some(9),
            capacity: Some(1),
            sibling_count: Some(1),
            sibling_index: Some(9),
            ..cpu(1)
        };
        let unknown = cpu(0);

        let keys = [
            Package,
            Node,
            SortKey::Cache(0),
            SortKey::Cache(4),
            Cluster,
            Core,
            SortKey::Capacity(SortDirection::Ascending),
            SortKey::Capacity(SortDirection::Descending),
            SortKey::SiblingCount(SortDirection::Ascending),
            SortKey::SiblingCount(SortDirection::Descending),
            SiblingIndex,
        ];

        for key in keys {
            assert_eq!(key.compare(&known, &unknown), Ordering::Less, "{key:?}");
            assert_eq!(key.compare(&unknown, &known), Ordering::Greater, "{key:?}");
            assert_eq!(key.compare(&unknown, &unknown), Ordering::Equal, "{key:?}");
        }
    }

    #[test]
    fn unavailable_sorts_last_in_every_policy_but_index() {
        let mut offline = cpu(0);
        offline.state.mark_offline();

        let mut excluded = cpu(1);
        excluded.state.mark_excluded();

        let available = cpu(2);

        for ordering in CpuOrdering::ALL {
            if ordering == CpuOrdering::Index {
                continue;
            }

            let mut cpus = vec![offline.clone(), excluded.clone(), available.clone()];
            ordering.sort(&mut cpus);

            assert_eq!(indexes(&cpus), vec![2, 0, 1], "{ordering}");
        }
    }

    #[test]
    fn index_restores_allocation_order() {
        let mut cpus = (0..8)
            .map(|index| CpuDescriptor {
                package_id: Some(7 - index / 4),
                capacity: Some(100 + index * 10),
                ..cpu(index)
            })
            .collect_vec();

        CpuOrdering::Locality.sort(&mut cpus);
        assert_eq!(indexes(&cpus), vec![4, 5, 6, 7, 0, 1, 2, 3]);

        CpuOrdering::Index.sort(&mut cpus);
        assert_eq!(indexes(&cpus), (0..8).collect_vec());

        // Already sorted, so nothing moves.
        let before = cpus.clone();
        CpuOrdering::Index.sort(&mut cpus);
        assert_eq!(cpus, before);
    }

    #[test]
    fn performance_prefers_big_smt_cores() {
        let little = CpuDescriptor {
            capacity: Some(50),
            sibling_count: Some(1),
            sibling_index: Some(0),
            ..cpu(0)
        };
        let big_thread_1 = CpuDescriptor {
            capacity: Some(100),
            sibling_count: Some(2),
            sibling_index: Some(1),
            ..cpu(1)
        };
        let big_thread_0 = CpuDescriptor {
            capacity: Some(100),
            sibling_count: Some(2),
            sibling_index: Some(0),
            ..cpu(2)
        };

        let mut cpus = vec![little.clone(), big_thread_1.clone(), big_thread_0.clone()];
        CpuOrdering::Performance.sort(&mut cpus);
        assert_eq!(indexes(&cpus), vec![2, 1, 0]);

        // Resource has no sibling index key, equal cores fall back to the index.
        let mut cpus = vec![big_thread_0, big_thread_1, little];
        CpuOrdering::Resource.sort(&mut cpus);
        assert_eq!(indexes(&cpus), vec![0, 1, 2]);
    }

    #[test]
    fn low_latency_keeps_package_before_capacity() {
        let near_small = CpuDescriptor {
            package_id: Some(0),
            capacity: Some(50),
            ..cpu(0)
        };
        let far_big = CpuDescriptor {
            package_id: Some(1),
            capacity: Some(100),
            ..cpu(1)
        };
        let near_big = CpuDescriptor {
            package_id: Some(0),
            capacity: Some(100),
            ..cpu(2)
        };

        let mut cpus = vec![near_small.clone(), far_big.clone(), near_big.clone()];
        CpuOrdering::LowLatency.sort(&mut cpus);
        assert_eq!(indexes(&cpus), vec![2, 0, 1]);

        let mut cpus = vec![near_small, far_big, near_big];
        CpuOrdering::Balanced.sort(&mut cpus);
        assert_eq!(indexes(&cpus), vec![2, 1, 0]);
    }

    #[test]
    fn cluster_ordering_groups_clusters_across_packages() {
        let mut cpus = [(0, 1), (1, 0), (0, 0), (1, 1)]
            .into_iter()
            .zip(0..)
            .map(|((package, cluster), index)| CpuDescriptor {
                package_id: Some(package),
                cluster_global_id: Some(cluster),
                ..cpu(index)
            })
            .collect_vec();

        CpuOrdering::Cluster.sort(&mut cpus);
        assert_eq!(indexes(&cpus), vec![2, 1, 0, 3]);
    }

    #[test]
    fn sort_survives_non_transitive_capacities() {
        let mut cpus = [108, 100, 104, 112, 96]
            .into_iter()
            .zip(0..)
            .map(|(capacity, index)| CpuDescriptor {
                capacity: Some(capacity),
                ..cpu(index)
            })
            .collect_vec();

        CpuOrdering::Performance.sort(&mut cpus);

        // Every neighbor pair is in order, which is all a tolerant comparison can promise.
        for pair in cpus.windows(2) {
            assert!(CpuOrdering::Performance.compare(&pair[0], &pair[1]).is_le());
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(CpuOrdering::LowLatency.to_string(), "low-latency");
        assert_eq!(CpuOrdering::ClusterCapacity.to_string(), "cluster-capacity");
        assert_eq!(CpuOrdering::Index.to_string(), "index");
    }
}
