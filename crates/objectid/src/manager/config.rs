use core::time::Duration;

use crate::{Error, Result};

/// Values requested per refill when not configured.
pub const DEFAULT_REQUEST_SIZE: u64 = 100;

/// Remaining stock that triggers a refill when not configured.
pub const DEFAULT_REQUEST_THRESHOLD: u64 = 20;

/// Client-side refill policy for [`crate::AllocationManager`].
///
/// Each refill reserves `request_size` values from the remote allocator. A
/// refill is triggered as soon as a type has `request_threshold` or fewer
/// values left, so callers rarely have to wait on the network. If the process
/// dies, at most `request_size - 1` values of the current block are lost;
/// they are never handed out again.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManagerConfig {
    request_size: u64,
    request_threshold: u64,
    request_timeout: Option<Duration>,
}

impl ManagerConfig {
    /// Creates a refill policy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] unless
    /// `0 < request_threshold < request_size`.
    pub fn new(request_size: u64, request_threshold: u64) -> Result<Self> {
        if request_threshold == 0 {
            return Err(Error::configuration(
                "the request threshold must be greater than 0",
            ));
        }
        if request_threshold >= request_size {
            return Err(Error::configuration(format!(
                "the request size ({request_size}) must be greater than the request threshold ({request_threshold})"
            )));
        }
        Ok(Self {
            request_size,
            request_threshold,
            request_timeout: None,
        })
    }

    /// Bounds every remote call. A call exceeding it fails with
    /// [`Error::Communication`] and changes nothing locally.
    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub const fn request_size(&self) -> u64 {
        self.request_size
    }

    pub const fn request_threshold(&self) -> u64 {
        self.request_threshold
    }

    pub const fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            request_size: DEFAULT_REQUEST_SIZE,
            request_threshold: DEFAULT_REQUEST_THRESHOLD,
            request_timeout: None,
        }
    }
}
