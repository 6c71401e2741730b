use std::num::NonZero;

use tracing::debug;

use crate::detect::detect_usable;
use crate::filter::refine;
use crate::fixup::fixup_topology;
use crate::pal::{Platform, PlatformFacade};
use crate::store::TopologyStore;
use crate::{
    CpuDescriptor, CpuIndex, CpuOrdering, CpuSelection, CpuSetConfig, Error, MAX_CPUS, Result,
    TopologyConfig, TopologyDump,
};

/// The processor topology of the host, reconciled, filtered and ordered for thread placement.
///
/// There is one descriptor per possible processor index (see [`MAX_CPUS`]). After detection the
/// descriptors are ordered by the configured [`CpuSelection`]. Every selection except
/// [`CpuSelection::All`] puts every usable processor (one that is neither excluded nor offline)
/// ahead of every unusable one. [`CpuSelection::All`] keeps plain index order, so excluded
/// processors stay in place between usable ones.
///
/// # Example
///
/// ```
/// use cpu_topo::{CpuTopology, TopologyConfig};
///
/// let mut config = TopologyConfig::new();
/// config.apply_directive(&["cpu-selection", "performance"]).unwrap();
///
/// let topology = CpuTopology::detect(&config).unwrap();
///
/// for cpu in topology.usable() {
///     println!("processor {} capacity {:?}", cpu.os_index(), cpu.capacity());
/// }
/// ```
#[derive(Clone, Debug)]
pub struct CpuTopology {
    store: TopologyStore,
    selection: CpuSelection,
    ordering: CpuOrdering,
}

impl CpuTopology {
    /// Detects the topology of the host and applies the given configuration to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the topology cannot be allocated or if no usable processor remains
    /// after applying the inherited processor affinity and the configured filters.
    pub fn detect(config: &TopologyConfig) -> Result<Self> {
        Self::detect_on(&PlatformFacade::target(), config)
    }

    pub(crate) fn detect_on(platform: &PlatformFacade, config: &TopologyConfig) -> Result<Self> {
        let mut store = TopologyStore::allocate(MAX_CPUS)?;

        detect_usable(store.descriptors_mut(), config.cpu_set(), platform);

        // The walk relies on the store still being in index order.
        platform.walk_topology(store.descriptors_mut());
        debug!(cpus = store.len(), span = store.span(), "platform topology walked");

        fixup_topology(store.descriptors_mut());
        refine(store.descriptors_mut(), config.cpu_set());

        let usable = store.usable_count();
        if usable == 0 {
            store.release();
            return Err(Error::NoUsableCpus);
        }

        let selection = config.selection();
        let ordering = selection.ordering();
        store.sort_by_keys(ordering.keys());

        debug!(usable, %selection, "processor topology ready");

        Ok(Self {
            store,
            selection,
            ordering,
        })
    }

    /// Every descriptor, in the current order.
    #[must_use]
    pub fn descriptors(&self) -> &[CpuDescriptor] {
        self.store.descriptors()
    }

    /// The usable descriptors, in the current order.
    pub fn usable(&self) -> impl Iterator<Item = &CpuDescriptor> {
        self.store
            .descriptors()
            .iter()
            .filter(|cpu| cpu.is_available())
    }

    /// Number of processors that are neither excluded nor offline.
    #[must_use]
    pub fn usable_count(&self) -> usize {
        self.store.usable_count()
    }

    /// The descriptor of the processor with the given operating system index.
    #[must_use]
    pub fn descriptor(&self, os_index: CpuIndex) -> Option<&CpuDescriptor> {
        self.store
            .descriptors()
            .iter()
            .find(|cpu| cpu.os_index() == os_index)
    }

    /// The selection strategy the topology was detected with.
    #[must_use]
    pub const fn selection(&self) -> CpuSelection {
        self.selection
    }

    /// The ordering the descriptors are currently sorted by.
    #[must_use]
    pub const fn ordering(&self) -> CpuOrdering {
        self.ordering
    }

    /// Re-sorts the descriptors in place.
    pub fn reorder(&mut self, ordering: CpuOrdering) {
        self.store.sort_by_keys(ordering.keys());
        self.ordering = ordering;
    }

    /// A copy of the descriptors sorted by the given ordering, leaving this topology untouched.
    #[must_use]
    pub fn sorted_by(&self, ordering: CpuOrdering) -> Vec<CpuDescriptor> {
        let mut cpus = self.store.descriptors().to_vec();
        ordering.sort(&mut cpus);
        cpus
    }

    /// Applies the node, cluster, core and thread filters of `config` again.
    ///
    /// Filters only ever exclude more processors, so refining twice with the same configuration
    /// is the same as refining once. Excluded processors stay in place until the next
    /// [`reorder()`][Self::reorder].
    pub fn refine(&mut self, config: &CpuSetConfig) {
        refine(self.store.descriptors_mut(), config);
    }

    /// Records the thread group the consumer assigned a processor to.
    ///
    /// This is the only part of a descriptor the consumer may change. Returns `false` if there
    /// is no processor with the given index.
    pub fn assign_thread_group(&mut self, os_index: CpuIndex, thread_group: NonZero<u32>) -> bool {
        let Some(cpu) = self
            .store
            .descriptors_mut()
            .iter_mut()
            .find(|cpu| cpu.os_index() == os_index)
        else {
            return false;
        };

        cpu.set_thread_group_id(thread_group);
        true
    }

    /// A human-readable report of the topology in its current order.
    #[must_use]
    pub fn dump(&self) -> TopologyDump<'_> {
        TopologyDump::new(self.store.descriptors())
    }
}
