mod bindings;
pub(crate) use bindings::*;

mod platform;
pub(crate) use platform::*;
