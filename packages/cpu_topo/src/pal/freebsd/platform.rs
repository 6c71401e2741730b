use std::io;

use tracing::trace;

use crate::pal::Platform;
use crate::pal::freebsd::{Bindings, BindingsFacade};
use crate::{CpuDescriptor, CpuSet, GroupId};

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform =
    BuildTargetPlatform::new(BindingsFacade::target());

/// The platform that matches the crate's build target.
///
/// FreeBSD exposes no per-processor topology files, so the only facts we gather are the memory
/// domain masks (which double as the list of online processors and as NUMA node membership) and
/// the startup affinity of the process.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform {
    bindings: BindingsFacade,
}

impl BuildTargetPlatform {
    pub(crate) const fn new(bindings: BindingsFacade) -> Self {
        Self { bindings }
    }

    /// Processor masks of each memory domain, in domain order. Domains whose mask cannot be read
    /// are skipped.
    fn domain_masks(&self) -> Vec<(GroupId, CpuSet)> {
        let count = match self.bindings.memory_domain_count() {
            Ok(count) => count,
            Err(error) => {
                trace!(%error, "memory domain count not available");
                return Vec::new();
            }
        };

        (0..count)
            .filter_map(|domain| {
                let mask = self
                    .bindings
                    .memory_domain_affinity(domain)
                    .inspect_err(|error| trace!(domain, %error, "memory domain mask not available"))
                    .ok()?;

                Some((GroupId::try_from(domain).ok()?, CpuSet::from(&mask)))
            })
            .collect()
    }
}

impl Platform for BuildTargetPlatform {
    fn online_cpus(&self) -> CpuSet {
        let mut online = CpuSet::new();

        for (_, mask) in self.domain_masks() {
            online.union_with(&mask);
        }

        online
    }

    fn bound_cpus(&self) -> io::Result<CpuSet> {
        self.bindings
            .process_affinity()
            .map(|cpuset| CpuSet::from(&cpuset))
    }

    fn walk_topology(&self, cpus: &mut [CpuDescriptor]) {
        for (node, mask) in self.domain_masks() {
            for cpu in cpus.iter_mut() {
                if cpu.node_id.is_none() && mask.contains(cpu.os_index) {
                    cpu.node_id = Some(node);
                }
            }
        }
    }
}
