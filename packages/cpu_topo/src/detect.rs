use tracing::{debug, warn};

use crate::pal::Platform;
use crate::{CpuDescriptor, CpuSet, CpuSetConfig, FilterScope};

/// Marks the processors that must not be used, based on the affinity inherited at startup, the
/// configured processor filter and the processors the platform reports as online.
///
/// Missing platform data never makes this fail. An online list the platform cannot provide is
/// not evidence that anything is offline, so nothing is marked offline in that case. A failed
/// affinity query is treated as an empty affinity mask.
pub(crate) fn detect_usable(
    cpus: &mut [CpuDescriptor],
    config: &CpuSetConfig,
    platform: &impl Platform,
) {
    if config.is_reset() {
        debug!("ignoring inherited processor affinity");
    } else {
        let bound = platform.bound_cpus().unwrap_or_else(|error| {
            warn!(%error, "unable to query the processor affinity of the process");
            CpuSet::new()
        });

        debug!(bound = bound.len(), cpus = %bound, "inherited processor affinity");

        for cpu in cpus.iter_mut() {
            if !bound.contains(cpu.os_index) {
                cpu.state.mark_excluded();
            }
        }
    }

    let filter = config.filter(FilterScope::Cpu);
    for cpu in cpus.iter_mut() {
        if filter.rejects(Some(cpu.os_index)) {
            cpu.state.mark_excluded();
        }
    }

    let online = platform.online_cpus();
    if online.is_empty() {
        debug!("no evidence about online processors");
    } else {
        debug!(online = online.len(), cpus = %online, "online processors");

        for cpu in cpus.iter_mut() {
            if !online.contains(cpu.os_index) {
                cpu.state.mark_offline();
            }
        }
    }

    debug!(
        excluded = cpus.iter().filter(|cpu| cpu.state.is_excluded()).count(),
        offline = cpus.iter().filter(|cpu| cpu.state.is_offline()).count(),
        "usable processors detected"
    );
}
