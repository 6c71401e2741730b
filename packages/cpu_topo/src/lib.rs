#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Detects the processor topology of the host and orders its processors for thread placement.
//!
//! Services that pin worker threads to processors need to know more than the number of
//! processors: which ones share a core, a cache, a cluster or a memory region, and which ones
//! are the big ones on heterogeneous hardware. Operating systems expose these facts unevenly and
//! sometimes inconsistently. This package gathers whatever the platform reports, reconciles it
//! into a consistent model and orders the processors according to a selection strategy.
//!
//! This is part of the [Folo project](https://github.com/folo-rs/folo) that provides mechanisms for
//! high-performance hardware-aware programming in Rust.
//!
//! # Pipeline
//!
//! [`CpuTopology::detect()`] runs these stages once, typically at process startup before any
//! worker threads are spawned:
//!
//! 1. Allocate one [`CpuDescriptor`] per possible processor index, every fact unknown.
//! 1. Exclude the processors outside the affinity inherited by the process (unless the
//!    configuration resets it) or outside the configured processor filter, and mark the
//!    processors the platform reports as offline.
//! 1. Merge in the topology facts the platform exposes: caches, cores, clusters, packages,
//!    capacity and NUMA nodes.
//! 1. Reconcile those facts: default missing capacities, assume a shared L3 where the platform
//!    hides it, renumber clusters and cores contiguously.
//! 1. Exclude processors by the configured node, cluster, core and thread filters.
//! 1. Order the processors by the configured [`CpuSelection`].
//!
//! Missing platform data is never an error. Whatever cannot be determined stays unknown and
//! unknown values always sort after known ones.
//!
//! # Configuration
//!
//! [`TopologyConfig`] accepts already-tokenized configuration directives:
//!
//! * `cpu-set reset` ignores the affinity inherited by the process.
//! * `cpu-set only-<scope> <cpulist>` and `cpu-set drop-<scope> <cpulist>` accept or reject
//!   processors by `cpu`, `node`, `cluster`, `core` or `thread` identifier.
//! * `cpu-selection <name>` picks the selection strategy, see [`CpuSelection`].
//!
//! ```
//! use cpu_topo::{CpuTopology, TopologyConfig};
//!
//! let mut config = TopologyConfig::new();
//! config.apply_directive(&["cpu-set", "drop-thread", "1-63"]).unwrap();
//! config.apply_directive(&["cpu-selection", "locality"]).unwrap();
//!
//! let topology = CpuTopology::detect(&config).unwrap();
//!
//! println!("{} usable processors", topology.usable_count());
//! print!("{}", topology.dump());
//! ```
//!
//! # Platform support
//!
//! * Linux: full topology from `/sys/devices/system/cpu` and `/sys/devices/system/node`.
//! * FreeBSD: online processors and NUMA nodes from the memory domain affinity masks.
//! * Other platforms: processors `0..available_parallelism()` with no further topology.

mod config;
mod cpu_set;
mod descriptor;
mod detect;
mod dump;
mod error;
mod filter;
mod fixup;
mod ordering;
mod pal;
mod primitive_types;
mod selection;
mod store;
mod topology;

pub use config::*;
pub use cpu_set::*;
pub use descriptor::*;
pub use dump::*;
pub use error::*;
pub use ordering::*;
pub use primitive_types::*;
pub use selection::*;
pub use topology::*;
