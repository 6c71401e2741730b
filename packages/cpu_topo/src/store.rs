use crate::{CpuDescriptor, CpuIndex, Error, MAX_CPUS, Result, SortKey};

/// The flat array of per-processor descriptors, one entry per possible processor index.
///
/// The array is allocated once and never resized. Entries are only ever mutated in place and
/// re-sorted, never individually added or removed.
#[derive(Clone, Debug, Default)]
pub(crate) struct TopologyStore {
    cpus: Vec<CpuDescriptor>,
}

impl TopologyStore {
    /// Allocates descriptors for processor indexes `0..max_cpus`, each knowing nothing except its
    /// own index.
    ///
    /// Requests above `MAX_CPUS` are capped, since no platform API we use can name them.
    pub(crate) fn allocate(max_cpus: usize) -> Result<Self> {
        let max_cpus = max_cpus.min(MAX_CPUS);

        let mut cpus = Vec::new();
        cpus.try_reserve_exact(max_cpus)
            .map_err(|source| Error::Allocation { max_cpus, source })?;

        cpus.extend(
            (0..max_cpus)
                .filter_map(|index| CpuIndex::try_from(index).ok())
                .map(CpuDescriptor::unknown),
        );

        Ok(Self { cpus })
    }

    /// Drops all descriptors. Calling this on an empty or already released store is a no-op.
    pub(crate) fn release(&mut self) {
        self.cpus = Vec::new();
    }

    pub(crate) fn descriptors(&self) -> &[CpuDescriptor] {
        &self.cpus
    }

    pub(crate) fn descriptors_mut(&mut self) -> &mut [CpuDescriptor] {
        &mut self.cpus
    }

    pub(crate) fn len(&self) -> usize {
        self.cpus.len()
    }

    /// Number of leading positions that may hold anything of interest: everything up to and
    /// including the last processor that is not known to be offline.
    ///
    /// If every processor is offline, the first position is still covered so that a non-empty
    /// store always has a non-empty span.
    pub(crate) fn span(&self) -> usize {
        span_of(&self.cpus)
    }

    /// Sorts the array according to the given chain of keys.
    pub(crate) fn sort_by_keys(&mut self, keys: &[SortKey]) {
        crate::ordering::sort_by_keys(&mut self.cpus, keys);
    }

    /// Number of processors that are neither excluded nor offline.
    pub(crate) fn usable_count(&self) -> usize {
        self.cpus.iter().filter(|cpu| cpu.is_available()).count()
    }
}

pub(crate) fn span_of(cpus: &[CpuDescriptor]) -> usize {
    cpus.iter()
        .rposition(|cpu| !cpu.state().is_offline())
        .map_or_else(|| cpus.len().min(1), |last| last.saturating_add(1))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn allocate_presets_unknown_descriptors() {
        let store = TopologyStore::allocate(16).unwrap();

        assert_eq!(store.len(), 16);

        for (position, cpu) in store.descriptors().iter().enumerate() {
            assert_eq!(cpu.os_index() as usize, position);
            assert!(cpu.is_available());
            assert_eq!(cpu.package_id(), None);
            assert_eq!(cpu.capacity(), None);
        }
    }

    #[test]
    fn allocate_is_capped() {
        let store = TopologyStore::allocate(MAX_CPUS * 4).unwrap();

        assert_eq!(store.len(), MAX_CPUS);
    }

    #[test]
    fn release_is_idempotent() {
        let mut store = TopologyStore::allocate(4).unwrap();

        store.release();
        assert_eq!(store.len(), 0);

        store.release();
        assert_eq!(store.len(), 0);

        let mut empty = TopologyStore::default();
        empty.release();
        assert_eq!(empty.len(), 0);
    }

    #[test]
    fn span_ends_at_last_non_offline() {
        let mut store = TopologyStore::allocate(8).unwrap();
        assert_eq!(store.span(), 8);

        for cpu in &mut store.descriptors_mut()[5..] {
            cpu.state.mark_offline();
        }

        // A hole in the middle does not shorten the span.
        store.descriptors_mut()[2].state.mark_offline();

        assert_eq!(store.span(), 5);
    }

    #[test]
    fn span_of_all_offline_covers_first() {
        let mut store = TopologyStore::allocate(3).unwrap();

        for cpu in store.descriptors_mut() {
            cpu.state.mark_offline();
        }

        assert_eq!(store.span(), 1);
        assert_eq!(TopologyStore::default().span(), 0);
    }

    #[test]
    fn usable_count_ignores_excluded_and_offline() {
        let mut store = TopologyStore::allocate(4).unwrap();

        store.descriptors_mut()[0].state.mark_excluded();
        store.descriptors_mut()[3].state.mark_offline();

        assert_eq!(store.usable_count(), 2);
    }
}
