use std::collections::TryReserveError;

use thiserror::Error;

/// Errors that abort topology detection or configuration.
///
/// Missing or unparsable platform data is never an error. Such values are simply recorded as
/// unknown and the pipeline continues.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The topology store could not be allocated.
    #[error("failed to allocate the topology of {max_cpus} processors")]
    Allocation {
        /// Number of descriptors that were requested.
        max_cpus: usize,

        /// The underlying allocation failure.
        #[source]
        source: TryReserveError,
    },

    /// A configuration directive was given an argument it cannot use.
    #[error("'{directive} {token}': {problem}")]
    InvalidDirective {
        /// The configuration keyword, such as `cpu-set`.
        directive: String,

        /// The offending token.
        token: String,

        /// Human-readable description of what is wrong with the token.
        problem: String,
    },

    /// A configuration directive was given too few arguments.
    #[error("'{directive}' requires {expected}")]
    MissingArgument {
        /// The configuration keyword, possibly followed by its sub-directive.
        directive: String,

        /// Human-readable description of the missing arguments.
        expected: String,
    },

    /// The configuration keyword is not one this crate handles.
    #[error("unknown keyword '{keyword}', only 'cpu-set' and 'cpu-selection' are supported")]
    UnknownKeyword {
        /// The keyword as given.
        keyword: String,
    },

    /// The `cpu-selection` directive named a strategy that does not exist.
    #[error("'{directive}' passed an unknown CPU selection strategy '{name}', supported values are: {supported}")]
    UnknownSelection {
        /// The configuration keyword.
        directive: String,

        /// The strategy name as given.
        name: String,

        /// All supported strategy names, formatted for display.
        supported: String,
    },

    /// After applying the boot affinity and the configured filters, no processor remains usable.
    #[error("no usable processor remains after applying affinity and configured processor filters")]
    NoUsableCpus,
}

/// Result type of fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;
