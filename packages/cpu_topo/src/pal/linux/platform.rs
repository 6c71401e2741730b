use std::io;

use tracing::trace;

use crate::pal::Platform;
use crate::pal::linux::topology_walker::walk_sysfs;
use crate::pal::linux::{Bindings, BindingsFacade, Filesystem, FilesystemFacade};
use crate::{CpuDescriptor, CpuSet};

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform =
    BuildTargetPlatform::new(BindingsFacade::target(), FilesystemFacade::target());

/// The platform that matches the crate's build target.
///
/// You would only use a different platform in unit tests that need to mock the platform.
/// Even then, whenever possible, unit tests should use the real platform for maximum realism.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform {
    bindings: BindingsFacade,
    fs: FilesystemFacade,
}

impl BuildTargetPlatform {
    pub(crate) const fn new(bindings: BindingsFacade, fs: FilesystemFacade) -> Self {
        Self { bindings, fs }
    }
}

impl Platform for BuildTargetPlatform {
    fn online_cpus(&self) -> CpuSet {
        let Some(contents) = self.fs.get_cpu_online_contents() else {
            trace!("no list of online processors exposed by the platform");
            return CpuSet::new();
        };

        CpuSet::from_cpulist(&contents).unwrap_or_else(|error| {
            trace!(%error, contents = contents.trim(), "unusable list of online processors");
            CpuSet::new()
        })
    }

    fn bound_cpus(&self) -> io::Result<CpuSet> {
        self.bindings
            .sched_getaffinity_current()
            .map(|cpuset| CpuSet::from(&cpuset))
    }

    fn walk_topology(&self, cpus: &mut [CpuDescriptor]) {
        walk_sysfs(&self.fs, cpus);
    }
}
