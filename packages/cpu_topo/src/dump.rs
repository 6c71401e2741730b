use std::fmt::{self, Display, Formatter};

use crate::store::span_of;
use crate::{CACHE_LEVELS, CpuDescriptor};

/// Human-readable report of a topology, one line per processor that is not offline.
///
/// Each line shows whether the processor is kept (`keep`) or excluded (`----`), its position in
/// the current ordering, its operating system index and every known identifier. Unknown
/// identifiers print as `-1`. The format is meant for operators and is not stable.
///
/// ```text
/// [keep] thr=  0 -> cpu=  0 pk=00 no=00 cl=000(000) l3=000 l2=00 l1=00 l0=00 ts=000 capa=100 smt=0/2
/// [----] thr=  1 -> cpu=  1 pk=00 no=00 cl=000(000) l3=000 l2=00 l1=00 l0=00 ts=000 capa=100 smt=1/2
/// ```
#[derive(Clone, Copy, Debug)]
pub struct TopologyDump<'a> {
    cpus: &'a [CpuDescriptor],
}

impl<'a> TopologyDump<'a> {
    pub(crate) const fn new(cpus: &'a [CpuDescriptor]) -> Self {
        Self { cpus }
    }
}

/// An identifier zero-padded to a minimum width, or `-1` if unknown.
struct Id(Option<u32>, usize);

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{id:0width$}", width = self.1),
            None => write!(f, "-1"),
        }
    }
}

impl Display for TopologyDump<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let has_smt = self
            .cpus
            .iter()
            .any(|cpu| cpu.sibling_count.is_some_and(|count| count > 1));

        for (position, cpu) in self.cpus.iter().enumerate().take(span_of(self.cpus)) {
            if cpu.state.is_offline() {
                continue;
            }

            write!(
                f,
                "[{}] thr={position:3} -> cpu={:3} pk={} no={} cl={}({})",
                if cpu.state.is_excluded() {
                    "----"
                } else {
                    "keep"
                },
                cpu.os_index,
                Id(cpu.package_id, 2),
                Id(cpu.node_id, 2),
                Id(cpu.cluster_global_id, 3),
                Id(cpu.cluster_local_id, 3),
            )?;

            for level in (0..CACHE_LEVELS).rev() {
                if let Some(id) = cpu.cache_ids[level] {
                    let width = if level < 3 { 2 } else { 3 };
                    write!(f, " l{level}={}", Id(Some(id), width))?;
                }
            }

            write!(
                f,
                " ts={} capa={}",
                Id(cpu.core_id, 3),
                Id(cpu.capacity, 0)
            )?;

            if has_smt {
                match cpu.sibling_count {
                    Some(count) if count > 1 => {
                        write!(f, " smt={}/{count}", Id(cpu.sibling_index, 0))?;
                    }
                    count => write!(f, " smt={}", Id(count, 0))?,
                }
            }

            writeln!(f)?;
        }

        Ok(())
    }
}
