use std::fmt::Debug;
use std::fs;
use std::path::{Path, PathBuf};

use crate::CpuIndex;
use crate::pal::linux::{CpuEntry, Filesystem};

const CPU_ROOT: &str = "/sys/devices/system/cpu";
const NODE_ROOT: &str = "/sys/devices/system/node";

/// The virtual filesystem for the real operating system that the build is targeting.
///
/// You would only use different filesystems in PAL unit tests that need to use a mock filesystem.
/// Even then, whenever possible, unit tests should use the real filesystem for maximum realism.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetFilesystem;

fn cpu_entry_path(cpu_index: CpuIndex, entry: CpuEntry) -> PathBuf {
    Path::new(CPU_ROOT)
        .join(format!("cpu{cpu_index}"))
        .join(entry.relative_path())
}

// Real filesystem bindings are excluded from coverage measurement because which entries exist
// depends on the kernel version and architecture of the test system.
#[cfg_attr(coverage_nightly, coverage(off))]
impl Filesystem for BuildTargetFilesystem {
    fn cpu_directory_exists(&self) -> bool {
        Path::new(CPU_ROOT).is_dir()
    }

    fn get_cpu_online_contents(&self) -> Option<String> {
        fs::read_to_string(format!("{CPU_ROOT}/online")).ok()
    }

    fn cpu_entry_exists(&self, cpu_index: CpuIndex, entry: CpuEntry) -> bool {
        cpu_entry_path(cpu_index, entry).exists()
    }

    fn get_cpu_entry_contents(&self, cpu_index: CpuIndex, entry: CpuEntry) -> Option<String> {
        fs::read_to_string(cpu_entry_path(cpu_index, entry)).ok()
    }

    fn get_node_entry_names(&self) -> Option<Vec<String>> {
        let entries = fs::read_dir(NODE_ROOT).ok()?;

        Some(
            entries
                .filter_map(Result::ok)
                .filter_map(|entry| entry.file_name().into_string().ok())
                .collect(),
        )
    }

    fn get_node_cpulist_contents(&self, node_name: &str) -> Option<String> {
        fs::read_to_string(format!("{NODE_ROOT}/{node_name}/cpulist")).ok()
    }
}
