use core::{future::Future, time::Duration};
use std::{
    collections::HashMap,
    sync::{Arc, OnceLock},
};

use parking_lot::RwLock;
use tokio::{sync::Mutex as AsyncMutex, time::Instant};
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Block, BlockSource, Error, IdType, LocalGenerator, ManagerConfig, ObjectId, Result,
    TypeListing,
};

/// How long a type listing is trusted when the source gives no max age.
pub const DEFAULT_TYPE_CACHE_AGE: Duration = Duration::from_secs(300);

const MAX_TYPE_CACHE_AGE: Duration = Duration::from_secs(7 * 86_400);

/// Per-type client state.
#[derive(Debug, Default)]
pub(super) struct Slot {
    generator: OnceLock<LocalGenerator>,
    /// Held for the duration of a refill, so there is at most one in flight.
    refill: AsyncMutex<()>,
}

impl Slot {
    fn available(&self) -> u64 {
        self.generator.get().map_or(0, LocalGenerator::available)
    }

    fn issue(&self, type_name: &str) -> Result<ObjectId> {
        self.generator
            .get()
            .ok_or_else(|| Error::Exhausted {
                type_name: type_name.to_string(),
            })?
            .next()
    }
}

#[derive(Debug, Default)]
struct TypeCache {
    by_name: HashMap<String, IdType>,
    by_id: HashMap<u32, IdType>,
    expires_at: Option<Instant>,
}

impl TypeCache {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now < at)
    }

    fn replace(&mut self, listing: TypeListing, now: Instant) {
        let max_age = listing
            .max_age
            .unwrap_or(DEFAULT_TYPE_CACHE_AGE)
            .min(MAX_TYPE_CACHE_AGE);
        self.by_name.clear();
        self.by_id.clear();
        for ty in listing.types {
            self.by_id.insert(ty.id, ty.clone());
            self.by_name.insert(ty.name.clone(), ty);
        }
        self.expires_at = now.checked_add(max_age);
    }
}

/// Client-side ID issuance on top of a [`BlockSource`].
///
/// The manager keeps one [`LocalGenerator`] per type and reserves blocks of
/// `request_size` values from the source whenever a generator has
/// `request_threshold` or fewer values left. Issuing an ID is a local
/// operation except when a refill is due.
///
/// While a refill for a type is in flight, other callers for that type keep
/// drawing from the remaining stock and only wait when there is none. There
/// is never more than one refill per type in flight. Refills for different
/// types are independent.
///
/// A failed or timed-out refill leaves the generator as it was. The remote
/// side may still have reserved the block; those values are skipped, never
/// reused.
///
/// ## Example
///
/// ```
/// use std::sync::Arc;
/// use objectid::{AllocationManager, BlockAllocator, ManagerConfig, MemoryCounterStore, TypeDeclaration};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let allocator = BlockAllocator::new(
///     MemoryCounterStore::new(),
///     1,
///     vec![TypeDeclaration::new("user", 1, "Registered users")],
/// )
/// .unwrap();
/// allocator.setup_types().unwrap();
///
/// let manager = AllocationManager::new(Arc::new(allocator), ManagerConfig::new(10, 2).unwrap());
/// let first = manager.generate_id("user").await.unwrap();
/// let second = manager.generate_id("user").await.unwrap();
/// assert_eq!((first.value, second.value), (1, 2));
/// assert_eq!(first.to_string(), "1:1:1");
/// # }
/// ```
#[derive(Debug)]
pub struct AllocationManager<S: BlockSource> {
    source: S,
    config: ManagerConfig,
    slots: RwLock<HashMap<String, Arc<Slot>>>,
    types: AsyncMutex<TypeCache>,
}

impl<S: BlockSource> AllocationManager<S> {
    pub fn new(source: S, config: ManagerConfig) -> Self {
        Self {
            source,
            config,
            slots: RwLock::new(HashMap::new()),
            types: AsyncMutex::new(TypeCache::default()),
        }
    }

    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Values buffered locally for a type, or `None` before its first block.
    pub fn available(&self, type_name: &str) -> Option<u64> {
        self.slots
            .read()
            .get(type_name)
            .and_then(|slot| slot.generator.get())
            .map(LocalGenerator::available)
    }

    /// Issues the next identifier of `type_name`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidRequest`] if `type_name` is empty.
    /// - Whatever the source returns when a due refill fails, typically
    ///   [`Error::Communication`] or [`Error::NotFound`].
    /// - [`Error::Exhausted`] if concurrent callers drained the stock and a
    ///   forced refill still left nothing to issue.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub async fn generate_id(&self, type_name: &str) -> Result<ObjectId> {
        let slot = self.ensure_provisioned(type_name).await?;
        self.issue(&slot, type_name).await
    }

    /// Makes sure `type_name` has stock above the refill threshold, fetching
    /// a block if needed. Useful to take the first network round trip out of
    /// the request path.
    ///
    /// # Errors
    ///
    /// Same as [`AllocationManager::generate_id`], minus exhaustion.
    pub async fn prepare(&self, type_name: &str) -> Result<()> {
        self.ensure_provisioned(type_name).await.map(drop)
    }

    /// [`AllocationManager::prepare`] for several types, stopping at the
    /// first failure.
    ///
    /// # Errors
    ///
    /// The first error returned by [`AllocationManager::prepare`].
    pub async fn prepare_all<I, T>(&self, type_names: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        for type_name in type_names {
            self.prepare(type_name.as_ref()).await?;
        }
        Ok(())
    }

    /// Looks a type up by name in the cached type listing.
    ///
    /// # Errors
    ///
    /// - [`Error::NotFound`] if the source does not list the type.
    /// - The source's error if the listing had to be refreshed and failed.
    pub async fn type_by_name(&self, type_name: &str) -> Result<IdType> {
        let cache = self.fresh_types().await?;
        cache
            .by_name
            .get(type_name)
            .cloned()
            .ok_or_else(|| Error::not_found(type_name))
    }

    /// Looks a type up by id in the cached type listing.
    ///
    /// # Errors
    ///
    /// Same as [`AllocationManager::type_by_name`].
    pub async fn type_by_id(&self, type_id: u32) -> Result<IdType> {
        let cache = self.fresh_types().await?;
        cache
            .by_id
            .get(&type_id)
            .cloned()
            .ok_or_else(|| Error::not_found(type_id.to_string()))
    }

    /// Drops the cached type listing so the next lookup refetches it.
    pub async fn invalidate_types(&self) {
        self.types.lock().await.expires_at = None;
    }

    async fn fresh_types(&self) -> Result<tokio::sync::MutexGuard<'_, TypeCache>> {
        let mut cache = self.types.lock().await;
        if !cache.is_fresh(Instant::now()) {
            let listing = self.call(self.source.list_types()).await?;
            #[cfg(feature = "tracing")]
            tracing::debug!(types = listing.types.len(), max_age = ?listing.max_age, "type listing refreshed");
            cache.replace(listing, Instant::now());
        }
        Ok(cache)
    }

    pub(super) fn slot(&self, type_name: &str) -> Arc<Slot> {
        if let Some(slot) = self.slots.read().get(type_name) {
            return Arc::clone(slot);
        }
        Arc::clone(self.slots.write().entry(type_name.to_string()).or_default())
    }

    #[cfg(test)]
    pub(super) fn tracked_types(&self) -> usize {
        self.slots.read().len()
    }

    async fn ensure_provisioned(&self, type_name: &str) -> Result<Arc<Slot>> {
        if type_name.is_empty() {
            return Err(Error::invalid("type name must not be empty"));
        }
        let slot = self.slot(type_name);
        if slot.available() > self.config.request_threshold() {
            return Ok(slot);
        }
        self.refill_or_forget(&slot, type_name, false).await?;
        Ok(slot)
    }

    /// Issues from `slot`, forcing one refill if concurrent callers drained
    /// it after it was provisioned.
    pub(super) async fn issue(&self, slot: &Arc<Slot>, type_name: &str) -> Result<ObjectId> {
        match slot.issue(type_name) {
            Err(Error::Exhausted { .. }) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(type_name, "stock ran out before refill, forcing one");
                self.refill_or_forget(slot, type_name, true).await?;
                slot.issue(type_name)
            }
            issued => issued,
        }
    }

    /// [`Self::refill`], unregistering the slot when it fails before the
    /// slot ever held a block. Unknown names leave no state behind.
    async fn refill_or_forget(
        &self,
        slot: &Arc<Slot>,
        type_name: &str,
        force: bool,
    ) -> Result<()> {
        let result = self.refill(slot, type_name, force).await;
        if result.is_err() && slot.generator.get().is_none() {
            let mut slots = self.slots.write();
            if slots
                .get(type_name)
                .is_some_and(|current| Arc::ptr_eq(current, slot))
            {
                slots.remove(type_name);
            }
        }
        result
    }

    /// Appends one block to the slot's generator unless another caller
    /// already did.
    ///
    /// Unforced refills return immediately if one is already in flight and
    /// some stock remains. Forced refills always wait their turn and only
    /// fetch if the stock is still empty afterwards.
    async fn refill(&self, slot: &Slot, type_name: &str, force: bool) -> Result<()> {
        let _guard = match slot.refill.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                if !force && slot.available() > 0 {
                    return Ok(());
                }
                slot.refill.lock().await
            }
        };

        let needed = if force {
            slot.available() == 0
        } else {
            slot.available() <= self.config.request_threshold()
        };
        if !needed {
            return Ok(());
        }

        let block = self.fetch_block(type_name).await?;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            type_name,
            start = block.start(),
            end = block.end(),
            "block received"
        );
        slot.generator
            .get_or_init(|| LocalGenerator::new(block.type_name(), block.type_id()))
            .add_block(block)
    }

    async fn fetch_block(&self, type_name: &str) -> Result<Block> {
        let block = self
            .call(
                self.source
                    .generate_block(type_name, self.config.request_size()),
            )
            .await?;
        if block.type_name() != type_name {
            return Err(Error::communication(format!(
                "asked for a block of '{type_name}' but received one of '{}'",
                block.type_name()
            )));
        }
        Ok(block)
    }

    async fn call<T>(&self, request: impl Future<Output = Result<T>>) -> Result<T> {
        match self.config.request_timeout() {
            Some(limit) => tokio::time::timeout(limit, request)
                .await
                .map_err(|_| Error::communication(format!("no answer within {limit:?}")))?,
            None => request.await,
        }
    }
}
