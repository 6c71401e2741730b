use std::fmt::Debug;
use std::io;

use crate::{CpuDescriptor, CpuSet};

/// The operating system facilities the topology pipeline consumes.
///
/// Absence of data is never an error here: a probe that finds nothing reports "no evidence" and
/// the caller decides what that means.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Platform: Debug + Send + Sync + 'static {
    /// Processors that exist and are online.
    ///
    /// Returns an empty set if the platform offers no way to tell. Callers must treat that as
    /// "no evidence" and never as "everything is offline".
    fn online_cpus(&self) -> CpuSet;

    /// Processors in the affinity mask the process inherited at startup.
    fn bound_cpus(&self) -> io::Result<CpuSet>;

    /// Fills in every topology fact the platform exposes for the given descriptors, which must be
    /// in processor index order with their availability flags already set.
    ///
    /// Values that are already known are never overwritten. Platforms without any topology
    /// source leave the descriptors untouched.
    fn walk_topology(&self, cpus: &mut [CpuDescriptor]);
}
