use core::{future::Future, time::Duration};
use std::sync::Arc;

use crate::{Block, BlockAllocator, CounterStore, IdType, Result};

/// A snapshot of the provisioned types, with how long it may be cached.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeListing {
    pub types: Vec<IdType>,
    /// `None` when the server did not say.
    pub max_age: Option<Duration>,
}

/// The remote end of block allocation, as seen by
/// [`crate::AllocationManager`].
///
/// Implementations must not leave any state changed when they fail: the
/// manager retries freely on [`crate::Error::Communication`].
pub trait BlockSource: Send + Sync {
    /// Reserves `amount` values of `type_name`.
    fn generate_block(
        &self,
        type_name: &str,
        amount: u64,
    ) -> impl Future<Output = Result<Block>> + Send;

    /// Lists the provisioned types.
    fn list_types(&self) -> impl Future<Output = Result<TypeListing>> + Send;
}

impl<T: BlockSource> BlockSource for Arc<T> {
    fn generate_block(
        &self,
        type_name: &str,
        amount: u64,
    ) -> impl Future<Output = Result<Block>> + Send {
        (**self).generate_block(type_name, amount)
    }

    fn list_types(&self) -> impl Future<Output = Result<TypeListing>> + Send {
        (**self).list_types()
    }
}

/// Serves blocks in-process, for embedded deployments and tests.
///
/// The counter write happens synchronously on the calling task.
impl<S: CounterStore> BlockSource for BlockAllocator<S> {
    async fn generate_block(&self, type_name: &str, amount: u64) -> Result<Block> {
        Self::generate_block(self, type_name, amount)
    }

    async fn list_types(&self) -> Result<TypeListing> {
        Ok(TypeListing {
            types: self.types(),
            max_age: Some(self.max_cache_age()),
        })
    }
}
