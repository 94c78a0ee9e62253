use crate::{CounterKey, Result};

/// Outcome of provisioning a counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provisioned {
    /// The counter did not exist and was created at zero.
    Created,
    /// The counter already existed and was left untouched.
    Existing(u64),
}

impl Provisioned {
    /// The counter value after provisioning.
    pub const fn value(self) -> u64 {
        match self {
            Self::Created => 0,
            Self::Existing(value) => value,
        }
    }
}

/// Durable storage for one monotonically non-decreasing counter per
/// [`CounterKey`].
///
/// The store is the sole source of truth for uniqueness. Implementations must
/// never report success for a write that may not have reached durable
/// storage, and any I/O failure surfaces as [`crate::Error::Storage`].
///
/// Exclusivity between a read and the following
/// [`CounterStore::validated_write`] is the caller's job (see
/// [`crate::BlockAllocator`]); the store itself only guarantees that the
/// compare and the write happen without another write in between.
pub trait CounterStore: Send + Sync {
    /// Returns `true` if a counter record exists for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if existence cannot be determined.
    fn exists(&self, key: &CounterKey) -> Result<bool>;

    /// Reads the persisted counter.
    ///
    /// A missing record is an error here; only [`CounterStore::provision`]
    /// may create one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] if the record is missing, malformed
    /// or unreadable.
    fn read(&self, key: &CounterKey) -> Result<u64>;

    /// Creates the record at zero if it does not exist yet. Never resets an
    /// existing record.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Storage`] on I/O failure.
    fn provision(&self, key: &CounterKey) -> Result<Provisioned>;

    /// Replaces the persisted value with `new` if and only if it currently
    /// equals `expected`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Storage`] if `new` is below `expected`; nothing is
    ///   written.
    /// - [`crate::Error::Consistency`] if the persisted value differs from
    ///   `expected`; nothing is written.
    /// - [`crate::Error::Storage`] on I/O failure.
    fn validated_write(&self, key: &CounterKey, expected: u64, new: u64) -> Result<()>;
}

impl<S: CounterStore + ?Sized> CounterStore for std::sync::Arc<S> {
    fn exists(&self, key: &CounterKey) -> Result<bool> {
        (**self).exists(key)
    }

    fn read(&self, key: &CounterKey) -> Result<u64> {
        (**self).read(key)
    }

    fn provision(&self, key: &CounterKey) -> Result<Provisioned> {
        (**self).provision(key)
    }

    fn validated_write(&self, key: &CounterKey, expected: u64, new: u64) -> Result<()> {
        (**self).validated_write(key, expected, new)
    }
}
