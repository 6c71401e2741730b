//! Detects the processor topology of the current host and prints it.
//!
//! ```text
//! cargo run --example dump_topology -- --cpu-set "drop-cpu 0" --selection performance
//! ```
//!
//! Set `RUST_LOG=cpu_topo=debug` to see what each detection stage found.

use std::io;
use std::process::ExitCode;

use argh::FromArgs;
use cpu_topo::{CpuTopology, TopologyConfig};
use tracing_subscriber::EnvFilter;

/// Detects the processor topology of the current host and prints it.
#[derive(FromArgs)]
struct Args {
    /// a cpu-set directive without its keyword, e.g. "only-node 0" (repeatable)
    #[argh(option)]
    cpu_set: Vec<String>,

    /// the CPU selection strategy to order processors by
    #[argh(option)]
    selection: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args: Args = argh::from_env();

    let mut config = TopologyConfig::new();

    for directive in &args.cpu_set {
        let tokens: Vec<&str> = ["cpu-set"]
            .into_iter()
            .chain(directive.split_whitespace())
            .collect();

        if let Err(e) = config.apply_directive(&tokens) {
            eprintln!("Invalid --cpu-set value: {e}");
            return ExitCode::FAILURE;
        }
    }

    if let Some(selection) = &args.selection {
        if let Err(e) = config.apply_directive(&["cpu-selection", selection.as_str()]) {
            eprintln!("Invalid --selection value: {e}");
            return ExitCode::FAILURE;
        }
    }

    let topology = match CpuTopology::detect(&config) {
        Ok(topology) => topology,
        Err(e) => {
            eprintln!("Topology detection failed: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!(
        "{} usable processors, ordered by '{}' ({})",
        topology.usable_count(),
        topology.selection(),
        topology.selection().description()
    );
    print!("{}", topology.dump());

    ExitCode::SUCCESS
}
