use std::num::NonZero;

use crate::{CACHE_LEVELS, Capacity, CpuIndex, GroupId};

/// What is known about the availability of a processor.
///
/// We only ever record negative facts we have evidence for: a processor is never claimed to be
/// bound or online, instead it may be marked as excluded or offline. Once set, neither flag is
/// ever cleared.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct CpuState {
    excluded: bool,
    offline: bool,
}

impl CpuState {
    /// The processor was excluded at boot, either by the inherited affinity mask or by
    /// configured processor filters.
    #[must_use]
    pub const fn is_excluded(self) -> bool {
        self.excluded
    }

    /// The processor is known to be offline.
    #[must_use]
    pub const fn is_offline(self) -> bool {
        self.offline
    }

    /// The processor is neither excluded nor known to be offline.
    #[must_use]
    pub const fn is_available(self) -> bool {
        !self.excluded && !self.offline
    }

    pub(crate) const fn mark_excluded(&mut self) {
        self.excluded = true;
    }

    pub(crate) const fn mark_offline(&mut self) {
        self.offline = true;
    }
}

/// Everything known about one processor of the host.
///
/// There is one descriptor per possible processor index. All identifiers start out unknown
/// (`None`) and are filled in by detection and reconciliation. Processors sharing the same known
/// identifier at some level (package, node, cluster, core, cache) share that resource.
///
/// Consumers may only record their own bookkeeping via
/// [`set_thread_group_id()`][Self::set_thread_group_id]; every other field is owned by the
/// topology engine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CpuDescriptor {
    pub(crate) state: CpuState,
    pub(crate) os_index: CpuIndex,

    /// One entry per cache level, L0 to L4.
    pub(crate) cache_ids: [Option<GroupId>; CACHE_LEVELS],

    /// Thread set identifier, i.e. which processors are hardware threads of the same core.
    pub(crate) core_id: Option<GroupId>,

    /// Unique across the whole machine.
    pub(crate) cluster_global_id: Option<GroupId>,

    /// Restarts from zero for every (package, node) pair.
    pub(crate) cluster_local_id: Option<GroupId>,

    pub(crate) node_id: Option<GroupId>,
    pub(crate) package_id: Option<GroupId>,

    pub(crate) thread_group_id: Option<NonZero<u32>>,

    pub(crate) sibling_count: Option<u32>,
    pub(crate) sibling_index: Option<u32>,

    pub(crate) capacity: Option<Capacity>,
}

impl CpuDescriptor {
    /// A descriptor for the processor with the given index about which nothing is known yet.
    pub(crate) const fn unknown(os_index: CpuIndex) -> Self {
        Self {
            state: CpuState {
                excluded: false,
                offline: false,
            },
            os_index,
            cache_ids: [None; CACHE_LEVELS],
            core_id: None,
            cluster_global_id: None,
            cluster_local_id: None,
            node_id: None,
            package_id: None,
            thread_group_id: None,
            sibling_count: None,
            sibling_index: None,
            capacity: None,
        }
    }

    /// The availability flags of the processor.
    #[must_use]
    pub const fn state(&self) -> CpuState {
        self.state
    }

    /// Shorthand for `state().is_available()`.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.state.is_available()
    }

    /// The processor number as the operating system names it.
    #[must_use]
    pub const fn os_index(&self) -> CpuIndex {
        self.os_index
    }

    /// Identifier of the cache instance used by this processor at the given level (0 to 4).
    ///
    /// Returns `None` if there is no such cache, it is not known or the level is out of range.
    #[must_use]
    pub fn cache_id(&self, level: usize) -> Option<GroupId> {
        self.cache_ids.get(level).copied().flatten()
    }

    /// Identifier of the physical core this processor is a hardware thread of.
    ///
    /// After reconciliation this is a small value, contiguous per (package, node).
    #[must_use]
    pub const fn core_id(&self) -> Option<GroupId> {
        self.core_id
    }

    /// Identifier of the cluster, unique across the machine.
    #[must_use]
    pub const fn cluster_global_id(&self) -> Option<GroupId> {
        self.cluster_global_id
    }

    /// Identifier of the cluster, unique within its (package, node) pair.
    #[must_use]
    pub const fn cluster_local_id(&self) -> Option<GroupId> {
        self.cluster_local_id
    }

    /// NUMA node the processor belongs to.
    #[must_use]
    pub const fn node_id(&self) -> Option<GroupId> {
        self.node_id
    }

    /// Physical package (socket) the processor belongs to.
    #[must_use]
    pub const fn package_id(&self) -> Option<GroupId> {
        self.package_id
    }

    /// Thread group assigned by the consumer of the topology, if any.
    #[must_use]
    pub const fn thread_group_id(&self) -> Option<NonZero<u32>> {
        self.thread_group_id
    }

    /// Records the thread group the consumer assigned this processor to.
    ///
    /// The topology engine never reads this value.
    pub const fn set_thread_group_id(&mut self, thread_group_id: NonZero<u32>) {
        self.thread_group_id = Some(thread_group_id);
    }

    /// Number of hardware threads of the core this processor belongs to.
    #[must_use]
    pub const fn sibling_count(&self) -> Option<u32> {
        self.sibling_count
    }

    /// Position of this processor among the hardware threads of its core.
    #[must_use]
    pub const fn sibling_index(&self) -> Option<u32> {
        self.sibling_index
    }

    /// Relative performance estimate, higher is better.
    #[must_use]
    pub const fn capacity(&self) -> Option<Capacity> {
        self.capacity
    }
}
