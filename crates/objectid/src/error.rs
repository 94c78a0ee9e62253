//! Error types shared by the allocation service and its clients.
//!
//! The variants mirror how each failure must be treated:
//!
//! - `NotFound`, `InvalidRequest`: caller-facing, recoverable.
//! - `Communication`: transient, always safe to retry since a failed remote
//!   call never leaves durable or local state half-updated.
//! - `RangeExhausted`, `Consistency`, `Storage`: fatal for the affected type.
//!   The counter is the only thing standing between us and duplicate IDs, so
//!   these require operator action and are never retried automatically.
//! - `Configuration`: fatal at startup.
//! - `Remote`: one of the fatal cases above, reported by a remote allocator.
//! - `Exhausted`: a local generator ran dry. The refill threshold is meant to
//!   make this unreachable; seeing it points at tuning or a bug.

use std::path::PathBuf;

/// Result alias defaulting to [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors that `objectid` can produce.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The type (by name or id) is unknown or not provisioned yet.
    #[error("type '{key}' was not found")]
    NotFound { key: String },

    /// The request itself was malformed (zero amount, mismatched block, ...).
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Advancing the counter would overflow its representable range.
    #[error(
        "cannot allocate {amount} values for type '{type_name}': last value {last_value} would overflow"
    )]
    RangeExhausted {
        type_name: String,
        last_value: u64,
        amount: u64,
    },

    /// The persisted counter did not hold the value we expected to replace.
    #[error(
        "counter for type '{type_name}' is {found} on disk but {expected} was expected; serving halted"
    )]
    Consistency {
        type_name: String,
        expected: u64,
        found: u64,
    },

    /// The durable counter could not be read or written.
    #[error("storage failure on '{}': {reason}", .path.display())]
    Storage {
        path: PathBuf,
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The remote allocator could not be reached or answered unexpectedly.
    #[error("communication error: {reason}")]
    Communication { reason: String },

    /// Type declarations or client settings are malformed.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// The remote allocator reported a failure that needs operator action
    /// on its side (halted type, storage, configuration).
    #[error("remote allocator failed ({code}): {message}")]
    Remote { code: String, message: String },

    /// The local generator has no buffered values left.
    #[error("ran out of buffered values for type '{type_name}'")]
    Exhausted { type_name: String },
}

impl Error {
    pub(crate) fn not_found(key: impl Into<String>) -> Self {
        Self::NotFound { key: key.into() }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    /// Builds a [`Error::Communication`] from any displayable failure.
    pub fn communication(reason: impl Into<String>) -> Self {
        Self::Communication {
            reason: reason.into(),
        }
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Storage {
            path: path.into(),
            reason: reason.into(),
            source: None,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, context: &str, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            reason: format!("{context}: {source}"),
            source: Some(source),
        }
    }

    /// Whether repeating the same call may succeed without operator action.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Communication { .. } | Self::Exhausted { .. })
    }

    /// Whether the failure requires an operator before the type can be
    /// served again.
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::RangeExhausted { .. }
                | Self::Consistency { .. }
                | Self::Storage { .. }
                | Self::Configuration { .. }
                | Self::Remote { .. }
        )
    }
}
