//! Reconciliation of the facts gathered by the platform walker.
//!
//! Platforms report topology inconsistently: some hide the last level cache, some report clusters
//! that are really cores, some report no capacity at all. The passes here work purely on the
//! descriptors already in memory and leave every id in a consistent, compact numbering.

use tracing::{debug, warn};

use crate::store::span_of;
use crate::{Capacity, CpuDescriptor, CpuOrdering, GroupId};

const L2: usize = 2;
const L3: usize = 3;
const L4: usize = 4;

/// Capacity assumed for a processor whose core runs several hardware threads.
pub(crate) const DEFAULT_SMT_CAPACITY: Capacity = 100;

/// Capacity assumed for a processor whose core runs a single hardware thread.
pub(crate) const DEFAULT_SINGLE_THREAD_CAPACITY: Capacity = 50;

/// Runs every fixup pass over the descriptors. On return the descriptors are in index order.
pub(crate) fn fixup_topology(cpus: &mut [CpuDescriptor]) {
    let span = span_of(cpus);

    default_capacities(cpus, span);

    CpuOrdering::Locality.sort(cpus);
    synthesize_missing_l3(cpus, span);

    CpuOrdering::ClusterCapacity.sort(cpus);
    let clusters = renumber_clusters(cpus, span);

    CpuOrdering::Locality.sort(cpus);
    let cores = compact_cores(cpus, span);

    CpuOrdering::Index.sort(cpus);

    debug!(span, clusters, cores, "topology fixed up");
}

/// True if both values are known and differ. Unknown never forces a boundary.
fn differs<T: PartialEq>(l: Option<T>, r: Option<T>) -> bool {
    match (l, r) {
        (Some(l), Some(r)) => l != r,
        _ => false,
    }
}

/// True if the highest cache level reported for `current` differs from the same level of
/// `previous`. Only levels 2 to 4 matter here, L4 taking precedence.
fn highest_cache_differs(previous: &CpuDescriptor, current: &CpuDescriptor) -> bool {
    for level in [L4, L3, L2] {
        if current.cache_ids[level].is_some() {
            return differs(previous.cache_ids[level], current.cache_ids[level]);
        }
    }

    false
}

fn capacity_differs(previous: Option<Capacity>, current: Option<Capacity>) -> bool {
    let (Some(previous), Some(current)) = (previous, current) else {
        return false;
    };

    let previous = u64::from(previous);
    let current = u64::from(current);

    current * 100 < previous * 95 || current * 95 > previous * 100
}

/// Package and node always split groups, even when only one side is known, so that processors
/// sharing a cluster or core id also share their package and node.
fn package_or_node_differs(previous: &CpuDescriptor, current: &CpuDescriptor) -> bool {
    previous.package_id != current.package_id || previous.node_id != current.node_id
}

fn default_capacities(cpus: &mut [CpuDescriptor], span: usize) {
    for cpu in cpus.iter_mut().take(span) {
        if cpu.capacity.is_none() {
            cpu.capacity = Some(if cpu.sibling_count.is_some_and(|count| count > 1) {
                DEFAULT_SMT_CAPACITY
            } else {
                DEFAULT_SINGLE_THREAD_CAPACITY
            });
        }
    }
}

/// Injects L3 instance 0 into groups of processors that report more than two L2 instances and no
/// L3 at all. Expects the descriptors to be in locality order.
fn synthesize_missing_l3(cpus: &mut [CpuDescriptor], span: usize) {
    let span = span.min(cpus.len());

    let mut run_start = 0;
    let mut l2_groups = 0_usize;
    let mut previous_l2 = None;

    for position in 0..span {
        if cpus[position].cache_ids[L3].is_some() {
            continue;
        }

        let domain = l3_domain(&cpus[position]);
        let starts_run = position == 0 || l3_domain(&cpus[position - 1]) != domain;

        if starts_run {
            run_start = position;
            l2_groups = 0;
            previous_l2 = None;
        }

        let l2 = cpus[position].cache_ids[L2];
        if l2.is_none() || l2 == previous_l2 {
            continue;
        }

        previous_l2 = l2;
        l2_groups += 1;

        if l2_groups == 3 {
            let mut injected = 0_usize;

            for cpu in &mut cpus[run_start..span] {
                if cpu.cache_ids[L3].is_none() && l3_domain(cpu) == domain {
                    cpu.cache_ids[L3] = Some(0);
                    injected += 1;
                }
            }

            warn!(
                package = ?domain.0,
                node = ?domain.1,
                injected,
                "more than two L2 caches without any L3 reported, assuming a shared L3"
            );
        }
    }
}

/// Processors that would share an unreported L3 have the same package, node and L4.
fn l3_domain(cpu: &CpuDescriptor) -> (Option<GroupId>, Option<GroupId>, Option<GroupId>) {
    (cpu.package_id, cpu.node_id, cpu.cache_ids[L4])
}

/// Assigns fresh cluster ids. The detected ids only decide where a new cluster starts. Expects
/// the descriptors to be in cluster-capacity order. Returns the number of clusters.
fn renumber_clusters(cpus: &mut [CpuDescriptor], span: usize) -> usize {
    let span = span.min(cpus.len());

    let mut global: GroupId = 0;
    let mut local: GroupId = 0;
    let mut clusters = 0_usize;
    let mut previous_raw = None;

    for position in 0..span {
        if position == 0 {
            clusters = 1;
        } else {
            let previous = &cpus[position - 1];
            let current = &cpus[position];

            if package_or_node_differs(previous, current) {
                global += 1;
                local = 0;
                clusters += 1;
            } else if differs(previous_raw, current.cluster_global_id)
                || highest_cache_differs(previous, current)
                || capacity_differs(previous.capacity, current.capacity)
            {
                global += 1;
                local += 1;
                clusters += 1;
            }
        }

        let cpu = &mut cpus[position];
        previous_raw = cpu.cluster_global_id;
        cpu.cluster_global_id = Some(global);
        cpu.cluster_local_id = Some(local);
    }

    clusters
}

/// Renumbers cores contiguously within each package and node. Expects the descriptors to be in
/// locality order. Returns the number of distinct cores.
fn compact_cores(cpus: &mut [CpuDescriptor], span: usize) -> usize {
    let span = span.min(cpus.len());

    let mut local: GroupId = 0;
    let mut cores = 0_usize;
    let mut previous_raw = None;

    for position in 0..span {
        if position == 0 {
            cores = 1;
        } else {
            let previous = &cpus[position - 1];
            let current = &cpus[position];

            if package_or_node_differs(previous, current) {
                local = 0;
                cores += 1;
            } else if differs(previous_raw, current.core_id)
                || highest_cache_differs(previous, current)
            {
                local += 1;
                cores += 1;
            }
        }

        let cpu = &mut cpus[position];
        previous_raw = cpu.core_id;
        cpu.core_id = Some(local);
    }

    cores
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn cpus(count: u32) -> Vec<CpuDescriptor> {
        (0..count).map(CpuDescriptor::unknown).collect()
    }

    /// Two hardware threads per core, cores numbered by their first thread like Linux does.
    fn with_smt_pairs(cpus: &mut [CpuDescriptor]) {
        for cpu in cpus {
            cpu.core_id = Some(cpu.os_index & !1);
            cpu.sibling_count = Some(2);
            cpu.sibling_index = Some(cpu.os_index & 1);
        }
    }

    fn cluster_ids(cpus: &[CpuDescriptor]) -> Vec<(Option<GroupId>, Option<GroupId>)> {
        cpus.iter()
            .map(|cpu| (cpu.cluster_global_id, cpu.cluster_local_id))
            .collect()
    }

    #[test]
    fn capacity_defaults_follow_smt() {
        let mut cpus = cpus(4);
        cpus[0].sibling_count = Some(2);
        cpus[1].sibling_count = Some(1);
        cpus[3].capacity = Some(1024);

        default_capacities(&mut cpus, 4);

        assert_eq!(cpus[0].capacity, Some(DEFAULT_SMT_CAPACITY));
        assert_eq!(cpus[1].capacity, Some(DEFAULT_SINGLE_THREAD_CAPACITY));
        assert_eq!(cpus[2].capacity, Some(DEFAULT_SINGLE_THREAD_CAPACITY));
        assert_eq!(cpus[3].capacity, Some(1024));
    }

    #[test]
    fn capacity_defaults_stay_within_span() {
        let mut cpus = cpus(4);

        default_capacities(&mut cpus, 2);

        assert!(cpus[1].capacity.is_some());
        assert!(cpus[2].capacity.is_none());
    }

    #[test]
    fn two_l2_without_l3_is_left_alone() {
        let mut cpus = cpus(4);
        for cpu in &mut cpus {
            cpu.package_id = Some(0);
            cpu.cache_ids[L2] = Some(cpu.os_index / 2);
        }

        synthesize_missing_l3(&mut cpus, 4);

        assert!(cpus.iter().all(|cpu| cpu.cache_ids[L3].is_none()));
    }

    #[test]
    fn three_l2_without_l3_get_a_shared_l3() {
        let mut cpus = cpus(6);
        for cpu in &mut cpus {
            cpu.package_id = Some(0);
            cpu.cache_ids[L2] = Some(cpu.os_index / 2);
        }

        synthesize_missing_l3(&mut cpus, 6);

        assert!(cpus.iter().all(|cpu| cpu.cache_ids[L3] == Some(0)));
    }

    #[test]
    fn l3_synthesis_is_per_package() {
        let mut cpus = cpus(10);
        for cpu in &mut cpus {
            // Package 0 has three L2 pairs, package 1 only two.
            cpu.package_id = Some(u32::from(cpu.os_index >= 6));
            cpu.cache_ids[L2] = Some(cpu.os_index / 2);
        }

        synthesize_missing_l3(&mut cpus, 10);

        assert!(cpus[..6].iter().all(|cpu| cpu.cache_ids[L3] == Some(0)));
        assert!(cpus[6..].iter().all(|cpu| cpu.cache_ids[L3].is_none()));
    }

    #[test]
    fn reported_l3_is_kept() {
        let mut cpus = cpus(6);
        for cpu in &mut cpus {
            cpu.package_id = Some(0);
            cpu.cache_ids[L2] = Some(cpu.os_index / 2);
            cpu.cache_ids[L3] = Some(7);
        }

        synthesize_missing_l3(&mut cpus, 6);

        assert!(cpus.iter().all(|cpu| cpu.cache_ids[L3] == Some(7)));
    }

    #[test]
    fn clusters_are_contiguous_per_package() {
        // 2 packages, 2 clusters of 2 processors each.
        let mut cpus = cpus(8);
        for cpu in &mut cpus {
            cpu.package_id = Some(cpu.os_index / 4);
            // Detected ids are sparse and shared across packages on purpose.
            cpu.cluster_global_id = Some((cpu.os_index / 2 % 2) * 10);
            cpu.capacity = Some(100);
        }

        let clusters = renumber_clusters(&mut cpus, 8);

        assert_eq!(clusters, 4);
        assert_eq!(
            cluster_ids(&cpus),
            vec![
                (Some(0), Some(0)),
                (Some(0), Some(0)),
                (Some(1), Some(1)),
                (Some(1), Some(1)),
                (Some(2), Some(0)),
                (Some(2), Some(0)),
                (Some(3), Some(1)),
                (Some(3), Some(1)),
            ]
        );
    }

    #[test]
    fn capacity_step_splits_cluster() {
        let mut cpus = cpus(4);
        for cpu in &mut cpus {
            cpu.package_id = Some(0);
        }
        cpus[0].capacity = Some(1024);
        cpus[1].capacity = Some(1000); // Within 5%.
        cpus[2].capacity = Some(512);
        cpus[3].capacity = Some(512);

        renumber_clusters(&mut cpus, 4);

        assert_eq!(
            cluster_ids(&cpus),
            vec![
                (Some(0), Some(0)),
                (Some(0), Some(0)),
                (Some(1), Some(1)),
                (Some(1), Some(1)),
            ]
        );
    }

    #[test]
    fn unknown_values_never_split_clusters() {
        let mut cpus = cpus(4);
        cpus[2].cache_ids[L3] = Some(5);
        cpus[3].capacity = Some(100);

        renumber_clusters(&mut cpus, 4);

        assert!(cpus.iter().all(|cpu| cpu.cluster_global_id == Some(0)));
    }

    #[test]
    fn unknown_package_starts_new_group() {
        // Offline processors inside the span expose no topology at all.
        let mut cpus = cpus(4);
        for index in [0, 2] {
            cpus[index].package_id = Some(0);
            cpus[index].node_id = Some(0);
            cpus[index].core_id = Some(cpus[index].os_index);
            cpus[index].sibling_count = Some(1);
        }
        cpus[1].state.mark_offline();
        cpus[3].state.mark_offline();

        fixup_topology(&mut cpus);

        assert_eq!(cpus[0].cluster_global_id, cpus[2].cluster_global_id);
        assert_ne!(cpus[0].cluster_global_id, cpus[1].cluster_global_id);
        assert_eq!(cpus[0].core_id, Some(0));
        assert_eq!(cpus[2].core_id, Some(1));
        // Core numbering restarts for the unknown package.
        assert_eq!(cpus[1].core_id, Some(0));
        assert_eq!(cpus[1].cluster_local_id, Some(0));
    }

    #[test]
    fn highest_cache_change_splits_cluster() {
        let mut cpus = cpus(4);
        for cpu in &mut cpus {
            cpu.package_id = Some(0);
            cpu.cache_ids[L2] = Some(cpu.os_index);
            cpu.cache_ids[L3] = Some(cpu.os_index / 2);
        }

        renumber_clusters(&mut cpus, 4);

        // L3 is the highest level so the L2 differences do not matter.
        assert_eq!(
            cpus.iter()
                .map(|cpu| cpu.cluster_global_id)
                .collect::<Vec<_>>(),
            vec![Some(0), Some(0), Some(1), Some(1)]
        );
    }

    #[test]
    fn cores_are_compacted_per_package() {
        let mut cpus = cpus(8);
        with_smt_pairs(&mut cpus);
        for cpu in &mut cpus {
            cpu.package_id = Some(cpu.os_index / 4);
        }

        let cores = compact_cores(&mut cpus, 8);

        assert_eq!(cores, 4);
        assert_eq!(
            cpus.iter().map(|cpu| cpu.core_id).collect::<Vec<_>>(),
            vec![
                Some(0),
                Some(0),
                Some(1),
                Some(1),
                Some(0),
                Some(0),
                Some(1),
                Some(1)
            ]
        );
    }

    #[test]
    fn full_fixup_restores_index_order() {
        let mut cpus = cpus(8);
        with_smt_pairs(&mut cpus);
        for cpu in &mut cpus {
            // Interleaved packages so the locality sorts really move things around.
            cpu.package_id = Some(cpu.os_index / 2 % 2);
        }

        fixup_topology(&mut cpus);

        assert!(cpus.iter().map(|cpu| cpu.os_index).eq(0..8));
        assert!(
            cpus.iter()
                .all(|cpu| cpu.capacity == Some(DEFAULT_SMT_CAPACITY))
        );
        // Each package is one cluster: nothing else tells its processors apart.
        assert_eq!(cpus[0].cluster_global_id, cpus[1].cluster_global_id);
        assert_eq!(cpus[0].cluster_global_id, cpus[4].cluster_global_id);
        assert_ne!(cpus[0].cluster_global_id, cpus[2].cluster_global_id);
        // Cores 0 and 4 form package 0, cores 2 and 6 form package 1.
        assert_eq!(cpus[0].core_id, Some(0));
        assert_eq!(cpus[4].core_id, Some(1));
        assert_eq!(cpus[2].core_id, Some(0));
        assert_eq!(cpus[6].core_id, Some(1));
    }

    #[test]
    fn offline_tail_is_untouched() {
        let mut cpus = cpus(4);
        cpus[2].state.mark_offline();
        cpus[3].state.mark_offline();

        fixup_topology(&mut cpus);

        assert!(cpus[1].capacity.is_some());
        assert!(cpus[3].capacity.is_none());
        assert!(cpus[3].cluster_global_id.is_none());
    }
}
