#![cfg_attr(
    test,
    allow(
        clippy::struct_field_names,
        reason = "false positive from automock generated code"
    )
)]

use std::fmt::Debug;

use crate::CpuIndex;

/// Linux has this funny notion of exposing various OS APIs as a virtual filesystem. This trait
/// abstracts this virtual filesystem to allow it to be mocked.
///
/// The scope of this trait is limited to the `/sys/devices/system` hierarchy. All I/O is
/// synchronous and blocking because we expect it to hit a fast path in the OS, given the data is
/// never on a real storage device. Every read may fail (entries come and go with kernel versions
/// and architectures), in which case the value is simply unknown.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Filesystem: Debug + Send + Sync + 'static {
    /// Whether the /sys/devices/system/cpu directory exists.
    fn cpu_directory_exists(&self) -> bool;

    /// Gets the contents of the /sys/devices/system/cpu/online file.
    ///
    /// This is a cpulist format file ("0,1,2-4,5-10:2" style list).
    fn get_cpu_online_contents(&self) -> Option<String>;

    /// Whether the given entry exists under /sys/devices/system/cpu/cpu{cpu_index}.
    fn cpu_entry_exists(&self, cpu_index: CpuIndex, entry: CpuEntry) -> bool;

    /// Gets the contents of the given file under /sys/devices/system/cpu/cpu{cpu_index}.
    fn get_cpu_entry_contents(&self, cpu_index: CpuIndex, entry: CpuEntry) -> Option<String>;

    /// Names of the entries of the /sys/devices/system/node directory, or `None` if the
    /// directory does not exist.
    fn get_node_entry_names(&self) -> Option<Vec<String>>;

    /// Gets the contents of the /sys/devices/system/node/{node_name}/cpulist file.
    ///
    /// This is a cpulist format file ("0,1,2-4,5-10:2" style list).
    fn get_node_cpulist_contents(&self, node_name: &str) -> Option<String>;
}

/// An entry in the sysfs directory of one processor.
///
/// Cache entries carry the `N` of their `cache/indexN` directory.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) enum CpuEntry {
    /// The processor directory itself.
    Directory,

    CacheDirectory,
    CacheIndexDirectory(u32),
    CacheType(u32),
    CacheLevel(u32),
    CacheSharedCpuList(u32),

    TopologyDirectory,
    ThreadSiblingsList,
    ClusterCpusList,
    CoreSiblingsList,
    PackageCpusList,
    PhysicalPackageId,

    CpuCapacity,
    AcpiCppcDirectory,
    NominalPerf,
    CpufreqDirectory,
    ScalingMaxFreq,
}

impl CpuEntry {
    /// Path of the entry relative to the processor directory. Empty for the directory itself.
    pub(crate) fn relative_path(self) -> String {
        match self {
            Self::Directory => String::new(),
            Self::CacheDirectory => "cache".to_string(),
            Self::CacheIndexDirectory(index) => format!("cache/index{index}"),
            Self::CacheType(index) => format!("cache/index{index}/type"),
            Self::CacheLevel(index) => format!("cache/index{index}/level"),
            Self::CacheSharedCpuList(index) => format!("cache/index{index}/shared_cpu_list"),
            Self::TopologyDirectory => "topology".to_string(),
            Self::ThreadSiblingsList => "topology/thread_siblings_list".to_string(),
            Self::ClusterCpusList => "topology/cluster_cpus_list".to_string(),
            Self::CoreSiblingsList => "topology/core_siblings_list".to_string(),
            Self::PackageCpusList => "topology/package_cpus_list".to_string(),
            Self::PhysicalPackageId => "topology/physical_package_id".to_string(),
            Self::CpuCapacity => "cpu_capacity".to_string(),
            Self::AcpiCppcDirectory => "acpi_cppc".to_string(),
            Self::NominalPerf => "acpi_cppc/nominal_perf".to_string(),
            Self::CpufreqDirectory => "cpufreq".to_string(),
            Self::ScalingMaxFreq => "cpufreq/scaling_max_freq".to_string(),
        }
    }
}
