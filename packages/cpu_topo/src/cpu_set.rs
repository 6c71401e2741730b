use std::fmt::{self, Debug, Display};

use thiserror::Error;

use crate::{CpuIndex, MAX_CPUS};

const WORD_BITS: usize = u64::BITS as usize;
const WORDS: usize = MAX_CPUS / WORD_BITS;

/// A fixed-capacity set of processor indexes (or any other small numeric identifiers, such as
/// NUMA node or cluster identifiers) in the range `0..MAX_CPUS`.
///
/// Identifiers outside the supported range are never members of any set. Inserting them is a
/// no-op, which mirrors how the operating system affinity masks behave.
///
/// # Example
///
/// ```
/// use cpu_topo::CpuSet;
///
/// let mut set = CpuSet::from_cpulist("0-3,8").unwrap();
/// set.intersect_with(&CpuSet::from_cpulist("2-9").unwrap());
///
/// assert_eq!(set.len(), 3);
/// assert!(set.contains(8));
/// assert!(!set.contains(1));
/// ```
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct CpuSet {
    words: [u64; WORDS],
}

impl CpuSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { words: [0; WORDS] }
    }

    /// Creates a set containing every identifier in `0..MAX_CPUS`.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            words: [u64::MAX; WORDS],
        }
    }

    /// Parses a set from the Linux cpulist format (`"0-3,8,10-15:2"`).
    ///
    /// Leading and trailing whitespace is ignored, so the contents of a sysfs file can be passed
    /// as-is. An empty string yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not valid cpulist syntax or names an identifier that does
    /// not fit in the set.
    pub fn from_cpulist(value: &str) -> Result<Self, CpuListError> {
        let value = value.trim();

        // Ranges are expanded eagerly by the parser, so bounds are checked first.
        check_range_endpoints(value)?;

        let items = cpulist::parse(value)?;

        let mut set = Self::new();

        for item in items {
            if !set.insert(item) {
                return Err(CpuListError::OutOfRange {
                    index: item,
                    max: MAX_CPUS,
                });
            }
        }

        Ok(set)
    }

    /// Adds an identifier to the set.
    ///
    /// Returns `false` if the identifier is outside the supported range and was ignored.
    pub fn insert(&mut self, cpu: CpuIndex) -> bool {
        let Some((word, mask)) = locate(cpu) else {
            return false;
        };

        if let Some(word) = self.words.get_mut(word) {
            *word |= mask;
        }

        true
    }

    /// Whether the identifier is a member of the set.
    #[must_use]
    pub fn contains(&self, cpu: CpuIndex) -> bool {
        locate(cpu)
            .and_then(|(word, mask)| self.words.get(word).map(|w| w & mask != 0))
            .unwrap_or(false)
    }

    /// Adds every member of `other` to this set.
    pub fn union_with(&mut self, other: &Self) {
        for (word, other_word) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= *other_word;
        }
    }

    /// Removes every member that is not also a member of `other`.
    pub fn intersect_with(&mut self, other: &Self) {
        for (word, other_word) in self.words.iter_mut().zip(other.words.iter()) {
            *word &= *other_word;
        }
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Whether the set has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Iterates over the members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = CpuIndex> + '_ {
        (0..MAX_CPUS)
            .filter_map(|cpu| CpuIndex::try_from(cpu).ok())
            .filter(|cpu| self.contains(*cpu))
    }
}

// Splits an identifier into the word that holds it and the bit mask within that word.
fn locate(cpu: CpuIndex) -> Option<(usize, u64)> {
    let cpu = usize::try_from(cpu).ok()?;

    if cpu >= MAX_CPUS {
        return None;
    }

    Some((cpu / WORD_BITS, 1_u64 << (cpu % WORD_BITS)))
}

impl Default for CpuSet {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<CpuIndex> for CpuSet {
    fn from_iter<I: IntoIterator<Item = CpuIndex>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl Extend<CpuIndex> for CpuSet {
    fn extend<I: IntoIterator<Item = CpuIndex>>(&mut self, iter: I) {
        for cpu in iter {
            self.insert(cpu);
        }
    }
}

impl Display for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&cpulist::emit(self.iter()))
    }
}

impl Debug for CpuSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CpuSet({self})")
    }
}

#[cfg(target_os = "linux")]
impl From<&libc::cpu_set_t> for CpuSet {
    fn from(value: &libc::cpu_set_t) -> Self {
        (0..MAX_CPUS)
            // SAFETY: No safety requirements beyond the index being in range of CPU_SETSIZE,
            // which MAX_CPUS matches.
            .filter(|cpu| unsafe { libc::CPU_ISSET(*cpu, value) })
            .filter_map(|cpu| CpuIndex::try_from(cpu).ok())
            .collect()
    }
}

#[cfg(target_os = "freebsd")]
impl From<&libc::cpuset_t> for CpuSet {
    fn from(value: &libc::cpuset_t) -> Self {
        (0..MAX_CPUS)
            // SAFETY: No safety requirements beyond the index being in range of the set.
            .filter(|cpu| unsafe { libc::CPU_ISSET(*cpu, value) })
            .filter_map(|cpu| CpuIndex::try_from(cpu).ok())
            .collect()
    }
}

/// Rejects any range endpoint that does not fit in a set. Pieces that are not numbers are left
/// for the cpulist parser to report. Strides are not endpoints and are not checked.
fn check_range_endpoints(value: &str) -> Result<(), CpuListError> {
    for item in value.split(',') {
        let range = item.split_once(':').map_or(item, |(range, _)| range);

        for endpoint in range.split('-') {
            let Ok(endpoint) = endpoint.parse::<u64>() else {
                continue;
            };

            if usize::try_from(endpoint).is_ok_and(|endpoint| endpoint < MAX_CPUS) {
                continue;
            }

            return Err(CpuListError::OutOfRange {
                index: CpuIndex::try_from(endpoint).unwrap_or(CpuIndex::MAX),
                max: MAX_CPUS,
            });
        }
    }

    Ok(())
}

/// Errors that can occur when turning a cpulist string into a [`CpuSet`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CpuListError {
    /// The value did not match the cpulist format.
    #[error(transparent)]
    Syntax(#[from] cpulist::Error),

    /// The value names an identifier that does not fit in a [`CpuSet`].
    #[error("{index} is out of range, identifiers must be below {max}")]
    OutOfRange {
        /// The first identifier found to be out of range.
        index: CpuIndex,

        /// The exclusive upper bound of supported identifiers.
        max: usize,
    },
}
