use std::fmt::Debug;
#[cfg(test)]
use std::sync::Arc;

use crate::CpuIndex;
#[cfg(test)]
use crate::pal::linux::MockFilesystem;
use crate::pal::linux::{BuildTargetFilesystem, CpuEntry, Filesystem};

/// Enum to hide the different filesystem implementations behind a single wrapper type.
#[derive(Clone)]
pub(crate) enum FilesystemFacade {
    Target(&'static BuildTargetFilesystem),

    #[cfg(test)]
    Mock(Arc<MockFilesystem>),
}

impl FilesystemFacade {
    pub(crate) const fn target() -> Self {
        Self::Target(&BuildTargetFilesystem)
    }

    #[cfg(test)]
    pub(crate) fn from_mock(mock: MockFilesystem) -> Self {
        Self::Mock(Arc::new(mock))
    }
}

impl Filesystem for FilesystemFacade {
    fn cpu_directory_exists(&self) -> bool {
        match self {
            Self::Target(filesystem) => filesystem.cpu_directory_exists(),
            #[cfg(test)]
            Self::Mock(mock) => mock.cpu_directory_exists(),
        }
    }

    fn get_cpu_online_contents(&self) -> Option<String> {
        match self {
            Self::Target(filesystem) => filesystem.get_cpu_online_contents(),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_cpu_online_contents(),
        }
    }

    fn cpu_entry_exists(&self, cpu_index: CpuIndex, entry: CpuEntry) -> bool {
        match self {
            Self::Target(filesystem) => filesystem.cpu_entry_exists(cpu_index, entry),
            #[cfg(test)]
            Self::Mock(mock) => mock.cpu_entry_exists(cpu_index, entry),
        }
    }

    fn get_cpu_entry_contents(&self, cpu_index: CpuIndex, entry: CpuEntry) -> Option<String> {
        match self {
            Self::Target(filesystem) => filesystem.get_cpu_entry_contents(cpu_index, entry),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_cpu_entry_contents(cpu_index, entry),
        }
    }

    fn get_node_entry_names(&self) -> Option<Vec<String>> {
        match self {
            Self::Target(filesystem) => filesystem.get_node_entry_names(),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_node_entry_names(),
        }
    }

    fn get_node_cpulist_contents(&self, node_name: &str) -> Option<String> {
        match self {
            Self::Target(filesystem) => filesystem.get_node_cpulist_contents(node_name),
            #[cfg(test)]
            Self::Mock(mock) => mock.get_node_cpulist_contents(node_name),
        }
    }
}

impl Debug for FilesystemFacade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Target(inner) => inner.fmt(f),
            #[cfg(test)]
            Self::Mock(inner) => inner.fmt(f),
        }
    }
}
