use std::ffi::c_int;
use std::fmt::Debug;
use std::io;
#[cfg(test)]
use std::sync::Arc;

use libc::cpuset_t;

#[cfg(test)]
use crate::pal::freebsd::MockBindings;
use crate::pal::freebsd::{Bindings, BuildTargetBindings};

/// Enum to hide the real/mock choice behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum BindingsFacade {
    Target(&'static BuildTargetBindings),

    #[cfg(test)]
    Mock(Arc<MockBindings>),
}

impl BindingsFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BuildTargetBindings)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockBindings) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Bindings for BindingsFacade {
    fn memory_domain_count(&self) -> Result<c_int, io::Error> {
        match self {
            Self::Target(bindings) => bindings.memory_domain_count(),
            #[cfg(test)]
            Self::Mock(mock) => mock.memory_domain_count(),
        }
    }

    fn memory_domain_affinity(&self, domain: c_int) -> Result<cpuset_t, io::Error> {
        match self {
            Self::Target(bindings) => bindings.memory_domain_affinity(domain),
            #[cfg(test)]
            Self::Mock(mock) => mock.memory_domain_affinity(domain),
        }
    }

    fn process_affinity(&self) -> Result<cpuset_t, io::Error> {
        match self {
            Self::Target(bindings) => bindings.process_affinity(),
            #[cfg(test)]
            Self::Mock(mock) => mock.process_affinity(),
        }
    }
}

#[cfg(test)]
impl From<MockBindings> for BindingsFacade {
    fn from(mock: MockBindings) -> Self {
        Self::from_mock(mock)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))] // No API contract to test.
impl Debug for BindingsFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(inner) => inner.fmt(f),
        }
    }
}
