use std::collections::HashMap;

use parking_lot::Mutex;

use crate::{CounterKey, CounterStore, Error, Provisioned, Result};

/// An in-process [`CounterStore`].
///
/// Counters live only as long as the store, which makes this suitable for
/// tests, benchmarks and single-process embedding where restarts do not need
/// to preserve uniqueness.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<CounterKey, u64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites a counter without any check.
    ///
    /// This models an out-of-band mutation (restored backup, a second writer)
    /// and exists so such situations can be reproduced deliberately.
    pub fn overwrite(&self, key: &CounterKey, value: u64) {
        self.counters.lock().insert(key.clone(), value);
    }
}

impl CounterStore for MemoryCounterStore {
    fn exists(&self, key: &CounterKey) -> Result<bool> {
        Ok(self.counters.lock().contains_key(key))
    }

    fn read(&self, key: &CounterKey) -> Result<u64> {
        self.counters
            .lock()
            .get(key)
            .copied()
            .ok_or_else(|| Error::storage(key.file_name(), "counter has not been provisioned"))
    }

    fn provision(&self, key: &CounterKey) -> Result<Provisioned> {
        let mut counters = self.counters.lock();
        match counters.get(key) {
            Some(&value) => Ok(Provisioned::Existing(value)),
            None => {
                counters.insert(key.clone(), 0);
                Ok(Provisioned::Created)
            }
        }
    }

    fn validated_write(&self, key: &CounterKey, expected: u64, new: u64) -> Result<()> {
        if new < expected {
            return Err(Error::storage(
                key.file_name(),
                format!("counter may not move back from {expected} to {new}"),
            ));
        }
        let mut counters = self.counters.lock();
        let slot = counters
            .get_mut(key)
            .ok_or_else(|| Error::storage(key.file_name(), "counter has not been provisioned"))?;
        if *slot != expected {
            return Err(Error::Consistency {
                type_name: key.type_name.clone(),
                expected,
                found: *slot,
            });
        }
        *slot = new;
        Ok(())
    }
}
