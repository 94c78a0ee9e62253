use core::time::Duration;
use std::{collections::HashMap, path::PathBuf, sync::Arc};

use parking_lot::{Mutex, RwLock};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Block, CounterKey, CounterStore, Error, IdType, Provisioned, Result, TypeDeclaration,
    validate_declarations,
};

/// How long clients may cache type listings unless configured otherwise.
pub const DEFAULT_MAX_CACHE_AGE: Duration = Duration::from_secs(86_400);

/// Result of [`BlockAllocator::setup_types`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetupReport {
    /// Names of the types whose counters were created by this call.
    pub created: Vec<String>,
}

/// Why a type stopped being served.
#[derive(Clone, Debug)]
enum Halt {
    Consistency { expected: u64, found: u64 },
    Storage { path: PathBuf, reason: String },
}

impl Halt {
    fn from_error(err: &Error) -> Option<Self> {
        match err {
            Error::Consistency {
                expected, found, ..
            } => Some(Self::Consistency {
                expected: *expected,
                found: *found,
            }),
            Error::Storage { path, reason, .. } => Some(Self::Storage {
                path: path.clone(),
                reason: reason.clone(),
            }),
            _ => None,
        }
    }

    fn to_error(&self, type_name: &str) -> Error {
        match self {
            Self::Consistency { expected, found } => Error::Consistency {
                type_name: type_name.to_string(),
                expected: *expected,
                found: *found,
            },
            Self::Storage { path, reason } => Error::Storage {
                path: path.clone(),
                reason: format!("type halted after earlier failure: {reason}"),
                source: None,
            },
        }
    }
}

#[derive(Debug)]
struct CounterState {
    last_value: u64,
    halted: Option<Halt>,
}

/// A provisioned type together with its exclusive counter lock.
#[derive(Debug)]
struct TypeEntry {
    ty: IdType,
    key: CounterKey,
    state: Mutex<CounterState>,
}

impl TypeEntry {
    fn new(ty: IdType, last_value: u64) -> Self {
        let key = CounterKey::from(&ty);
        Self {
            ty,
            key,
            state: Mutex::new(CounterState {
                last_value,
                halted: None,
            }),
        }
    }
}

#[derive(Debug, Default)]
struct Registry {
    by_name: HashMap<String, Arc<TypeEntry>>,
    by_id: HashMap<u32, Arc<TypeEntry>>,
}

impl Registry {
    fn insert(&mut self, entry: Arc<TypeEntry>) {
        self.by_id.insert(entry.ty.id, Arc::clone(&entry));
        self.by_name.insert(entry.ty.name.clone(), entry);
    }
}

/// The server side of block allocation.
///
/// For each provisioned type the allocator keeps the last issued value in
/// memory behind a per-type lock. [`BlockAllocator::generate_block`] advances
/// it by the requested amount with a compare-and-write against the
/// [`CounterStore`], using the in-memory value as the expected old value.
/// Any difference means the record changed behind our back, and the type is
/// halted rather than risk handing out a range twice.
///
/// Calls for different types never contend with each other. Calls for the
/// same type are serialized, and each one returns a range that starts right
/// after the previous one ended, whether it was issued before or after a
/// process restart.
///
/// ## Example
///
/// ```
/// use objectid::{BlockAllocator, MemoryCounterStore, TypeDeclaration};
///
/// let allocator = BlockAllocator::new(
///     MemoryCounterStore::new(),
///     1,
///     vec![TypeDeclaration::new("user", 1, "Registered users")],
/// )
/// .unwrap();
/// allocator.setup_types().unwrap();
///
/// let first = allocator.generate_block("user", 100).unwrap();
/// let second = allocator.generate_block("user", 100).unwrap();
/// assert_eq!((first.start(), first.end()), (1, 100));
/// assert_eq!((second.start(), second.end()), (101, 200));
/// ```
#[derive(Debug)]
pub struct BlockAllocator<S: CounterStore> {
    store: S,
    source_id: u64,
    declarations: Vec<TypeDeclaration>,
    max_cache_age: Duration,
    registry: RwLock<Arc<Registry>>,
    setup: Mutex<()>,
}

impl<S: CounterStore> BlockAllocator<S> {
    /// Creates an allocator serving `declarations` for `source_id`.
    ///
    /// Declared types whose counter already exists in `store` are loaded and
    /// served immediately. The rest are skipped until
    /// [`BlockAllocator::setup_types`] provisions them.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if `source_id` is zero or the declarations
    ///   are invalid.
    /// - [`Error::Storage`] if an existing counter cannot be read.
    pub fn new(store: S, source_id: u64, declarations: Vec<TypeDeclaration>) -> Result<Self> {
        if source_id == 0 {
            return Err(Error::configuration("source id must be greater than 0"));
        }
        validate_declarations(&declarations)?;

        let allocator = Self {
            store,
            source_id,
            declarations,
            max_cache_age: DEFAULT_MAX_CACHE_AGE,
            registry: RwLock::new(Arc::default()),
            setup: Mutex::new(()),
        };
        {
            let _setup = allocator.setup.lock();
            allocator.process_types(false)?;
        }
        Ok(allocator)
    }

    /// Sets how long clients may cache type listings.
    #[must_use]
    pub fn with_max_cache_age(mut self, max_cache_age: Duration) -> Self {
        self.max_cache_age = max_cache_age;
        self
    }

    pub const fn source_id(&self) -> u64 {
        self.source_id
    }

    pub const fn max_cache_age(&self) -> Duration {
        self.max_cache_age
    }

    /// Provisions a counter at zero for every declared type that lacks one.
    ///
    /// Already provisioned types keep their counter and in-memory state, so
    /// calling this any number of times is safe.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if a counter cannot be created or read. Types
    /// processed before the failure stay provisioned on disk and are picked up
    /// by the next call.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip(self), fields(source_id = self.source_id)))]
    pub fn setup_types(&self) -> Result<SetupReport> {
        let _setup = self.setup.lock();
        let created = self.process_types(true)?;
        #[cfg(feature = "tracing")]
        tracing::info!(created = created.len(), "type setup finished");
        Ok(SetupReport { created })
    }

    fn process_types(&self, allow_setup: bool) -> Result<Vec<String>> {
        let current = Arc::clone(&self.registry.read());
        let mut next = Registry::default();
        let mut created = Vec::new();

        for decl in &self.declarations {
            if let Some(entry) = current.by_id.get(&decl.id) {
                next.insert(Arc::clone(entry));
                continue;
            }

            let ty = IdType {
                name: decl.name.clone(),
                description: decl.description.clone(),
                id: decl.id,
                source: self.source_id,
            };
            let key = CounterKey::from(&ty);

            let last_value = if self.store.exists(&key)? {
                let value = self.store.read(&key)?;
                #[cfg(feature = "tracing")]
                tracing::info!(type_name = %ty.name, last_value = value, "loaded existing counter");
                value
            } else if allow_setup {
                let provisioned = self.store.provision(&key)?;
                if provisioned == Provisioned::Created {
                    created.push(ty.name.clone());
                }
                provisioned.value()
            } else {
                #[cfg(feature = "tracing")]
                tracing::warn!(type_name = %ty.name, "counter missing, type unavailable until setup");
                continue;
            };

            next.insert(Arc::new(TypeEntry::new(ty, last_value)));
        }

        *self.registry.write() = Arc::new(next);
        Ok(created)
    }

    fn entry_by_name(&self, type_name: &str) -> Option<Arc<TypeEntry>> {
        self.registry.read().by_name.get(type_name).cloned()
    }

    /// All provisioned types, ordered by id.
    pub fn types(&self) -> Vec<IdType> {
        let registry = Arc::clone(&self.registry.read());
        let mut types: Vec<_> = registry.by_id.values().map(|e| e.ty.clone()).collect();
        types.sort_by_key(|ty| ty.id);
        types
    }

    /// Looks up a provisioned type by its numeric id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no provisioned type has this id.
    pub fn type_by_id(&self, type_id: u32) -> Result<IdType> {
        self.registry
            .read()
            .by_id
            .get(&type_id)
            .map(|e| e.ty.clone())
            .ok_or_else(|| Error::not_found(type_id.to_string()))
    }

    /// Looks up a provisioned type by name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if no provisioned type has this name.
    pub fn type_by_name(&self, type_name: &str) -> Result<IdType> {
        self.entry_by_name(type_name)
            .map(|e| e.ty.clone())
            .ok_or_else(|| Error::not_found(type_name))
    }

    /// The last value handed out for a type, as tracked in memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the type is not provisioned.
    pub fn last_value(&self, type_name: &str) -> Result<u64> {
        let entry = self
            .entry_by_name(type_name)
            .ok_or_else(|| Error::not_found(type_name))?;
        Ok(entry.state.lock().last_value)
    }

    /// Reserves the next `amount` values of a type.
    ///
    /// The durable counter is advanced before the block is returned, so the
    /// range is never handed out again even if the caller never uses it.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `amount` is zero.
    /// - [`Error::NotFound`] if the type is unknown or not provisioned.
    /// - [`Error::RangeExhausted`] if the counter would overflow. Nothing is
    ///   written.
    /// - [`Error::Consistency`] / [`Error::Storage`] if the compare-and-write
    ///   fails. The type is halted and every later call fails the same way.
    #[cfg_attr(feature = "tracing", instrument(level = "debug", skip(self)))]
    pub fn generate_block(&self, type_name: &str, amount: u64) -> Result<Block> {
        if amount == 0 {
            return Err(Error::invalid(
                "the number of ids requested must be greater than 0",
            ));
        }
        let entry = self
            .entry_by_name(type_name)
            .ok_or_else(|| Error::not_found(type_name))?;

        let mut state = entry.state.lock();
        if let Some(halt) = &state.halted {
            return Err(halt.to_error(&entry.ty.name));
        }

        let old = state.last_value;
        let new = old.checked_add(amount).ok_or_else(|| Error::RangeExhausted {
            type_name: entry.ty.name.clone(),
            last_value: old,
            amount,
        })?;

        if let Err(err) = self.store.validated_write(&entry.key, old, new) {
            #[cfg(feature = "tracing")]
            tracing::error!(type_name = %entry.ty.name, error = %err, "counter write failed, halting type");
            state.halted = Halt::from_error(&err);
            return Err(err);
        }
        state.last_value = new;
        drop(state);

        #[cfg(feature = "tracing")]
        tracing::debug!(type_name = %entry.ty.name, start = old + 1, end = new, "block allocated");

        Block::new(
            entry.ty.name.clone(),
            entry.ty.id,
            entry.ty.source,
            old + 1,
            new,
        )
    }
}
