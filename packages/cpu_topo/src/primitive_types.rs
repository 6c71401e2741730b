/// Identifies a specific processor.
///
/// This matches the numeric identifier used by standard tooling of the operating system
/// (e.g. the `N` in `/sys/devices/system/cpu/cpuN` on Linux). It is the stable identity key of a
/// [`CpuDescriptor`][crate::CpuDescriptor] and is never reassigned, whatever order the topology
/// array is sorted in.
pub type CpuIndex = u32;

/// Identifies a topological grouping (package, NUMA node, cluster, core or cache instance).
///
/// Group identifiers are mostly assigned on the fly as groups are discovered and have no meaning
/// beyond "processors with the same identifier share the designated resource". A group identifier
/// that could not be determined is represented as `None` wherever a `GroupId` is exposed.
pub type GroupId = u32;

/// Relative performance estimate of a processor. Higher is better.
///
/// The value is unitless and only meaningful when compared against other processors of the same
/// system. Comparisons tolerate a 5% margin, see [`capacity_cmp()`][crate::capacity_cmp].
pub type Capacity = u32;

/// The maximum number of processors this crate can describe.
///
/// This matches `CPU_SETSIZE` of the Linux affinity API. The topology array always has exactly
/// this many entries, one per possible processor index.
pub const MAX_CPUS: usize = 1024;

/// Number of cache levels tracked per processor, L0 to L4.
pub const CACHE_LEVELS: usize = 5;
