//! Platform Abstraction Layer (PAL). This is private API.
//!
//! Each supported operating system family provides the same three probes: which processors are
//! online, which processors the process was bound to at startup and whatever topology facts the
//! platform exposes.

mod abstractions;
pub(crate) use abstractions::*;

mod facade;
pub(crate) use facade::*;

#[cfg(all(target_os = "linux", not(miri)))]
mod linux;
#[cfg(all(target_os = "linux", not(miri)))]
pub(crate) use linux::*;

#[cfg(all(target_os = "freebsd", not(miri)))]
mod freebsd;
#[cfg(all(target_os = "freebsd", not(miri)))]
pub(crate) use freebsd::*;

// The fallback module is compiled in test mode on all platforms, under Miri, and as the primary
// implementation on unsupported platforms. It is only glob-imported when it is the primary
// implementation. On supported platforms in test mode it must be accessed via the explicit path
// `fallback::` to avoid ambiguity with the platform-specific implementation.
#[cfg(any(test, miri, not(any(target_os = "linux", target_os = "freebsd"))))]
pub(crate) mod fallback;

#[cfg(any(miri, not(any(target_os = "linux", target_os = "freebsd"))))]
pub(crate) use fallback::*;
