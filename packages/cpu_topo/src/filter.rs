use tracing::debug;

use crate::{CpuDescriptor, CpuSetConfig, FilterScope};

/// Excludes every processor whose node, cluster, core or thread falls outside the configured
/// filters.
///
/// Only meaningful once the ids have been reconciled, since the cluster and core filters refer to
/// the compacted ids that are local to each package and node. Exclusion is never undone, so
/// refining again with the same configuration changes nothing.
pub(crate) fn refine(cpus: &mut [CpuDescriptor], config: &CpuSetConfig) {
    let nodes = config.filter(FilterScope::Node);
    let clusters = config.filter(FilterScope::Cluster);
    let cores = config.filter(FilterScope::Core);
    let threads = config.filter(FilterScope::Thread);

    let mut excluded = 0_usize;

    for cpu in cpus.iter_mut() {
        if cpu.state.is_excluded() {
            continue;
        }

        if nodes.rejects(cpu.node_id)
            || clusters.rejects(cpu.cluster_local_id)
            || cores.rejects(cpu.core_id)
            || threads.rejects(cpu.sibling_index)
        {
            cpu.state.mark_excluded();
            excluded += 1;
        }
    }

    debug!(excluded, "topology filters applied");
}
