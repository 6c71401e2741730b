//! Fills processor descriptors from `/sys/devices/system/{cpu,node}`.
//!
//! Every group we discover (cache instance, core, cluster, package) is given a fresh identifier
//! from a per-kind counter and assigned to all its members in one step. A processor whose value
//! was already filled in through another member of its group is not re-read.

use tracing::{debug, trace};

use crate::pal::linux::{CpuEntry, Filesystem, FilesystemFacade};
use crate::store::span_of;
use crate::{CACHE_LEVELS, CpuDescriptor, CpuIndex, CpuSet, GroupId};

/// Some processors expose L0 to L4 as separate data and instruction caches. Anything past this
/// many `cache/indexN` entries is not a cache hierarchy we know how to interpret.
const MAX_CACHE_INDEXES: u32 = 10;

pub(crate) fn walk_sysfs(fs: &FilesystemFacade, cpus: &mut [CpuDescriptor]) {
    if fs.cpu_directory_exists() {
        let mut walker = SysfsWalker {
            fs,
            features: SysfsFeatures::default(),
            next: NextIds::default(),
        };

        // Only the processors up to the last one not known to be offline are of any interest.
        let span = span_of(cpus);
        let cpus = cpus.get_mut(..span).unwrap_or_default();

        for position in 0..cpus.len() {
            walker.visit(cpus, position);
        }

        debug!(
            cores = walker.next.core,
            clusters = walker.next.cluster,
            packages = walker.next.package,
            "walked processor topology"
        );
    } else {
        trace!("no processor directory in sysfs");
    }

    assign_numa_nodes(fs, cpus);
}

/// Which optional parts of the sysfs hierarchy this kernel exposes.
///
/// Each one is probed on the first processor that needs it and the answer is reused for every
/// other processor.
#[derive(Debug, Default)]
struct SysfsFeatures {
    cache: Option<bool>,
    topology: Option<bool>,
    cluster_list: Option<bool>,
    package_list: Option<bool>,
    capacity: Option<bool>,
    acpi_cppc: Option<bool>,
    cpufreq: Option<bool>,
}

fn probe_once(feature: &mut Option<bool>, probe: impl FnOnce() -> bool) -> bool {
    *feature.get_or_insert_with(probe)
}

/// The identifier to hand out to the next group of each kind.
#[derive(Debug, Default)]
struct NextIds {
    cache: [GroupId; CACHE_LEVELS],
    core: GroupId,
    cluster: GroupId,
    package: GroupId,
}

fn take_next(counter: &mut GroupId) -> GroupId {
    let id = *counter;
    *counter = counter.saturating_add(1);
    id
}

#[derive(Debug)]
struct SysfsWalker<'a> {
    fs: &'a FilesystemFacade,
    features: SysfsFeatures,
    next: NextIds,
}

impl SysfsWalker<'_> {
    fn visit(&mut self, cpus: &mut [CpuDescriptor], position: usize) {
        let Some(cpu) = cpus.get(position) else {
            return;
        };

        if cpu.state.is_offline() {
            return;
        }

        let index = cpu.os_index;

        if !self.fs.cpu_entry_exists(index, CpuEntry::Directory) {
            trace!(index, "no sysfs directory for processor");
            return;
        }

        let fs = self.fs;

        if probe_once(&mut self.features.cache, || {
            fs.cpu_entry_exists(index, CpuEntry::CacheDirectory)
        }) {
            self.walk_caches(cpus, position, index);
        }

        if probe_once(&mut self.features.topology, || {
            fs.cpu_entry_exists(index, CpuEntry::TopologyDirectory)
        }) {
            self.walk_topology(cpus, position, index);
        }

        self.read_capacity(cpus, position, index);
    }

    fn walk_caches(&mut self, cpus: &mut [CpuDescriptor], position: usize, index: CpuIndex) {
        let mut next_level = 1;

        for cache_index in 0..MAX_CACHE_INDEXES {
            if !self
                .fs
                .cpu_entry_exists(index, CpuEntry::CacheIndexDirectory(cache_index))
            {
                break;
            }

            if self
                .read(index, CpuEntry::CacheType(cache_index))
                .is_some_and(|cache_type| cache_type == "Instruction")
            {
                continue;
            }

            let level = match self
                .read(index, CpuEntry::CacheLevel(cache_index))
                .and_then(|level| level.parse::<usize>().ok())
            {
                Some(level) => level,
                None => next_level,
            };
            next_level = level.saturating_add(1);

            if level >= CACHE_LEVELS {
                continue;
            }

            if cpus
                .get(position)
                .is_none_or(|cpu| cpu.cache_ids[level].is_some())
            {
                continue;
            }

            let Some(sharing) = self.read_set(index, CpuEntry::CacheSharedCpuList(cache_index))
            else {
                continue;
            };

            let id = take_next(&mut self.next.cache[level]);

            for cpu in members(cpus, &sharing) {
                cpu.cache_ids[level].get_or_insert(id);
            }
        }
    }

    fn walk_topology(&mut self, cpus: &mut [CpuDescriptor], position: usize, index: CpuIndex) {
        let Some(cpu) = cpus.get(position) else {
            return;
        };

        let core_known = cpu.core_id.is_some();
        let cluster_known = cpu.cluster_global_id.is_some();

        // The sibling list is also needed to recognize fake clusters, so we read it whenever
        // either value is missing.
        let siblings = if core_known && cluster_known {
            CpuSet::new()
        } else {
            self.read_set(index, CpuEntry::ThreadSiblingsList)
                .unwrap_or_default()
        };

        if !core_known && !siblings.is_empty() {
            let core_id = take_next(&mut self.next.core);
            let sibling_count = u32::try_from(siblings.len()).unwrap_or(u32::MAX);

            for (sibling_index, cpu) in (0..).zip(members(cpus, &siblings)) {
                if cpu.core_id.is_none() {
                    cpu.core_id = Some(core_id);
                    cpu.sibling_count = Some(sibling_count);
                    cpu.sibling_index = Some(sibling_index);
                }
            }
        }

        self.walk_cluster(cpus, position, index, &siblings);
        self.walk_package(cpus, position, index);
    }

    // Cluster lists, when they exist, can be smaller and more precise than package lists
    // (e.g. big.LITTLE). Some kernels report one cluster per processor and some machines report
    // one cluster per core, neither of which tells us anything, so such lists are ignored.
    fn walk_cluster(
        &mut self,
        cpus: &mut [CpuDescriptor],
        position: usize,
        index: CpuIndex,
        siblings: &CpuSet,
    ) {
        let fs = self.fs;

        if !probe_once(&mut self.features.cluster_list, || {
            fs.cpu_entry_exists(index, CpuEntry::ClusterCpusList)
                || fs.cpu_entry_exists(index, CpuEntry::CoreSiblingsList)
        }) {
            return;
        }

        if cpus
            .get(position)
            .is_none_or(|cpu| cpu.cluster_global_id.is_some())
        {
            return;
        }

        let Some(contents) = self
            .read(index, CpuEntry::ClusterCpusList)
            .or_else(|| self.read(index, CpuEntry::CoreSiblingsList))
        else {
            return;
        };

        let Some(cluster) = parse_set(index, &contents) else {
            return;
        };

        if cluster.len() <= 1 || cluster == *siblings {
            return;
        }

        let id = take_next(&mut self.next.cluster);

        for cpu in members(cpus, &cluster) {
            if cpu.cluster_global_id.is_none() {
                cpu.cluster_global_id = Some(id);
                cpu.cluster_local_id = Some(id);
            }
        }
    }

    // Package lists are preferred because they cover all members in a single read. Not every
    // kernel provides them, so we fall back to the core siblings list and finally to the scalar
    // package identifier of each processor.
    fn walk_package(&mut self, cpus: &mut [CpuDescriptor], position: usize, index: CpuIndex) {
        let fs = self.fs;

        let has_package_list = probe_once(&mut self.features.package_list, || {
            fs.cpu_entry_exists(index, CpuEntry::PackageCpusList)
                || fs.cpu_entry_exists(index, CpuEntry::CoreSiblingsList)
        });

        let package_unknown = cpus.get(position).is_some_and(|cpu| cpu.package_id.is_none());

        if has_package_list && package_unknown {
            let package = self
                .read(index, CpuEntry::PackageCpusList)
                .or_else(|| self.read(index, CpuEntry::CoreSiblingsList))
                .and_then(|contents| parse_set(index, &contents));

            if let Some(package) = package {
                let id = take_next(&mut self.next.package);

                for cpu in members(cpus, &package) {
                    cpu.package_id.get_or_insert(id);
                }
            }
        }

        let physical_package_id = match cpus.get(position) {
            Some(cpu) if cpu.package_id.is_none() => {
                self.read_number(index, CpuEntry::PhysicalPackageId)
            }
            _ => None,
        };

        if let (Some(cpu), Some(id)) = (cpus.get_mut(position), physical_package_id) {
            cpu.package_id = Some(id);
        }
    }

    // Capacity is a relative notion used to tell big cores from little ones. The sources are
    // tried from most to least trustworthy.
    fn read_capacity(&mut self, cpus: &mut [CpuDescriptor], position: usize, index: CpuIndex) {
        let fs = self.fs;
        let Some(cpu) = cpus.get_mut(position) else {
            return;
        };

        // Usually 1024 for the biggest cores and less for the others.
        if cpu.capacity.is_none()
            && probe_once(&mut self.features.capacity, || {
                fs.cpu_entry_exists(index, CpuEntry::CpuCapacity)
            })
        {
            cpu.capacity = self.read_number(index, CpuEntry::CpuCapacity);
        }

        // Servers often expose this instead. Only nominal_perf is trustworthy here.
        if cpu.capacity.is_none()
            && probe_once(&mut self.features.acpi_cppc, || {
                fs.cpu_entry_exists(index, CpuEntry::AcpiCppcDirectory)
            })
        {
            cpu.capacity = self.read_number(index, CpuEntry::NominalPerf);
        }

        // kHz, scaled to roughly MHz to stay in the same range as the other sources.
        if cpu.capacity.is_none()
            && probe_once(&mut self.features.cpufreq, || {
                fs.cpu_entry_exists(index, CpuEntry::CpufreqDirectory)
            })
        {
            cpu.capacity = self
                .read_number(index, CpuEntry::ScalingMaxFreq)
                .map(|khz| khz.saturating_add(999) / 1000);
        }
    }

    /// Reads a sysfs file, trimmed. Empty files count as absent.
    fn read(&self, index: CpuIndex, entry: CpuEntry) -> Option<String> {
        let Some(contents) = self.fs.get_cpu_entry_contents(index, entry) else {
            trace!(index, path = %entry.relative_path(), "sysfs entry not readable");
            return None;
        };

        let contents = contents.trim();

        if contents.is_empty() {
            return None;
        }

        Some(contents.to_string())
    }

    fn read_set(&self, index: CpuIndex, entry: CpuEntry) -> Option<CpuSet> {
        parse_set(index, &self.read(index, entry)?)
    }

    fn read_number(&self, index: CpuIndex, entry: CpuEntry) -> Option<u32> {
        let contents = self.read(index, entry)?;

        contents
            .parse()
            .inspect_err(|error| {
                trace!(index, path = %entry.relative_path(), %error, %contents, "unparsable sysfs entry");
            })
            .ok()
    }
}

fn parse_set(index: CpuIndex, contents: &str) -> Option<CpuSet> {
    CpuSet::from_cpulist(contents)
        .inspect_err(|error| {
            trace!(index, %error, contents, "unparsable processor list in sysfs");
        })
        .ok()
}

fn members<'a>(
    cpus: &'a mut [CpuDescriptor],
    set: &'a CpuSet,
) -> impl Iterator<Item = &'a mut CpuDescriptor> {
    cpus.iter_mut().filter(|cpu| set.contains(cpu.os_index))
}

// Node membership is independent of affinity, so every descriptor is considered, not only the
// ones up to the last online processor.
fn assign_numa_nodes(fs: &FilesystemFacade, cpus: &mut [CpuDescriptor]) {
    let Some(names) = fs.get_node_entry_names() else {
        trace!("no NUMA node directory in sysfs");
        return;
    };

    let mut nodes = 0_usize;

    for name in names {
        let Some(node_id) = parse_node_name(&name) else {
            continue;
        };

        let Some(members_set) = fs
            .get_node_cpulist_contents(&name)
            .and_then(|contents| CpuSet::from_cpulist(&contents).ok())
        else {
            trace!(%name, "NUMA node without a readable processor list");
            continue;
        };

        for cpu in members(cpus, &members_set) {
            cpu.node_id = Some(node_id);
        }

        nodes += 1;
    }

    debug!(nodes, "assigned NUMA nodes");
}

/// `node<N>` with `N` a non-negative decimal number and nothing after it.
fn parse_node_name(name: &str) -> Option<GroupId> {
    let digits = name.strip_prefix("node")?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    digits.parse().ok()
}
