use std::ffi::{CStr, c_int};
use std::fmt::Debug;
use std::{io, mem, ptr};

use libc::cpuset_t;

use crate::pal::freebsd::Bindings;

// Not every libc release exposes this selector, so we carry the value from <sys/cpuset.h>.
const CPU_WHICH_DOMAIN: libc::cpuwhich_t = 6;

const NDOMAINS_SYSCTL: &CStr = c"vm.ndomains";

/// FFI bindings that target the real operating system that the build is targeting.
///
/// You would only use different bindings in PAL unit tests that need to use mock bindings.
/// Even then, whenever possible, unit tests should use real bindings for maximum realism.
#[derive(Debug, Default)]
pub(crate) struct BuildTargetBindings;

// Real OS bindings are excluded from coverage measurement because error paths require OS-level
// failures that are impractical to trigger in tests.
#[cfg_attr(coverage_nightly, coverage(off))]
impl Bindings for BuildTargetBindings {
    fn memory_domain_count(&self) -> Result<c_int, io::Error> {
        let mut count: c_int = 0;
        let mut len = size_of::<c_int>();

        // SAFETY: The name is NUL-terminated and the output buffer is a c_int of matching length.
        let result = unsafe {
            libc::sysctlbyname(
                NDOMAINS_SYSCTL.as_ptr(),
                (&raw mut count).cast(),
                &raw mut len,
                ptr::null(),
                0,
            )
        };

        if result == 0 {
            Ok(count)
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn memory_domain_affinity(&self, domain: c_int) -> Result<cpuset_t, io::Error> {
        getaffinity(
            libc::CPU_LEVEL_WHICH,
            CPU_WHICH_DOMAIN,
            libc::id_t::from(domain),
        )
    }

    fn process_affinity(&self) -> Result<cpuset_t, io::Error> {
        // -1 means the current process.
        getaffinity(libc::CPU_LEVEL_CPUSET, libc::CPU_WHICH_PID, -1)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
fn getaffinity(
    level: libc::cpulevel_t,
    which: libc::cpuwhich_t,
    id: libc::id_t,
) -> Result<cpuset_t, io::Error> {
    // SAFETY: All zeroes is a valid (empty) cpuset_t.
    let mut mask: cpuset_t = unsafe { mem::zeroed() };

    // SAFETY: The buffer is a valid cpuset_t and we pass its real size.
    let result =
        unsafe { libc::cpuset_getaffinity(level, which, id, size_of::<cpuset_t>(), &raw mut mask) };

    if result == 0 {
        Ok(mask)
    } else {
        Err(io::Error::last_os_error())
    }
}
