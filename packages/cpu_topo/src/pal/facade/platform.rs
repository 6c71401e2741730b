use std::fmt::Debug;
use std::io;
#[cfg(test)]
use std::sync::Arc;

#[cfg(test)]
use crate::pal::MockPlatform;
#[cfg(test)]
use crate::pal::fallback::BuildTargetPlatform as FallbackPlatform;
use crate::pal::{BUILD_TARGET_PLATFORM, BuildTargetPlatform, Platform};
use crate::{CpuDescriptor, CpuSet};

/// Enum to hide the different platform implementations behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum PlatformFacade {
    Target(&'static BuildTargetPlatform),

    #[cfg(test)]
    Fallback(&'static FallbackPlatform),

    #[cfg(test)]
    Mock(Arc<MockPlatform>),
}

impl PlatformFacade {
    pub(crate) fn target() -> Self {
        Self::Target(&BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn fallback() -> Self {
        Self::Fallback(&crate::pal::fallback::BUILD_TARGET_PLATFORM)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockPlatform) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Platform for PlatformFacade {
    fn online_cpus(&self) -> CpuSet {
        match self {
            Self::Target(p) => p.online_cpus(),
            #[cfg(test)]
            Self::Fallback(p) => p.online_cpus(),
            #[cfg(test)]
            Self::Mock(p) => p.online_cpus(),
        }
    }

    fn bound_cpus(&self) -> io::Result<CpuSet> {
        match self {
            Self::Target(p) => p.bound_cpus(),
            #[cfg(test)]
            Self::Fallback(p) => p.bound_cpus(),
            #[cfg(test)]
            Self::Mock(p) => p.bound_cpus(),
        }
    }

    fn walk_topology(&self, cpus: &mut [CpuDescriptor]) {
        match self {
            Self::Target(p) => p.walk_topology(cpus),
            #[cfg(test)]
            Self::Fallback(p) => p.walk_topology(cpus),
            #[cfg(test)]
            Self::Mock(p) => p.walk_topology(cpus),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl Debug for PlatformFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Fallback(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(inner) => inner.fmt(f),
        }
    }
}

#[cfg(test)]
impl From<MockPlatform> for PlatformFacade {
    fn from(mock: MockPlatform) -> Self {
        Self::from_mock(mock)
    }
}
