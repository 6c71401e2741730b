use std::ffi::c_int;
use std::fmt::Debug;
use std::io;

use libc::cpuset_t;

/// Bindings for FFI calls into external libraries (either provided by operating system or not).
///
/// All PAL FFI calls must go through this trait, enabling them to be mocked.
#[cfg_attr(test, mockall::automock)]
pub(crate) trait Bindings: Debug + Send + Sync + 'static {
    // sysctlbyname("vm.ndomains")
    fn memory_domain_count(&self) -> Result<c_int, io::Error>;

    // cpuset_getaffinity() for the processors of one memory domain
    fn memory_domain_affinity(&self, domain: c_int) -> Result<cpuset_t, io::Error>;

    // cpuset_getaffinity() for the cpuset of the current process
    fn process_affinity(&self) -> Result<cpuset_t, io::Error>;
}
