use std::io;
use std::num::NonZeroUsize;
use std::thread;

use crate::pal::Platform;
use crate::{CpuDescriptor, CpuIndex, CpuSet};

/// Fallback platform implementation for operating systems without native support.
///
/// This implementation provides graceful degradation on unsupported platforms by:
/// - Reporting no evidence about which processors are online
/// - Treating processors `0..available_parallelism()` as the startup affinity
/// - Exposing no topology facts at all
///
/// The rest of the pipeline fills in defaults, so the result is a flat topology of identical
/// processors.
#[derive(Debug)]
pub(crate) struct BuildTargetPlatform;

/// Singleton instance of `BuildTargetPlatform`, used by public API types
/// to hook up to the correct PAL implementation.
pub(crate) static BUILD_TARGET_PLATFORM: BuildTargetPlatform = BuildTargetPlatform;

impl Platform for BuildTargetPlatform {
    fn online_cpus(&self) -> CpuSet {
        CpuSet::new()
    }

    fn bound_cpus(&self) -> io::Result<CpuSet> {
        let count = thread::available_parallelism().map_or(1, NonZeroUsize::get);

        Ok((0..count)
            .filter_map(|index| CpuIndex::try_from(index).ok())
            .collect())
    }

    fn walk_topology(&self, _cpus: &mut [CpuDescriptor]) {}
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn reports_no_online_evidence() {
        assert!(BUILD_TARGET_PLATFORM.online_cpus().is_empty());
    }

    #[test]
    #[cfg_attr(miri, ignore)] // Miri cannot query the available parallelism.
    fn bound_matches_available_parallelism() {
        let bound = BUILD_TARGET_PLATFORM.bound_cpus().unwrap();
        let expected = thread::available_parallelism().map_or(1, NonZeroUsize::get);

        assert_eq!(bound.len(), expected.min(crate::MAX_CPUS));
        assert!(bound.contains(0));
    }

    #[test]
    fn walk_is_a_no_op() {
        let mut cpus = vec![CpuDescriptor::unknown(0), CpuDescriptor::unknown(1)];
        let before = cpus.clone();

        BUILD_TARGET_PLATFORM.walk_topology(&mut cpus);

        assert_eq!(cpus, before);
    }
}
