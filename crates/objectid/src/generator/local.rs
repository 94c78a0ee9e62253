use std::collections::VecDeque;

use parking_lot::Mutex;
#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{Block, Error, ObjectId, Result};

#[derive(Debug, Default)]
struct State {
    blocks: VecDeque<Block>,
    /// Next value to issue from the head block. Meaningless while empty.
    cursor: u64,
    /// Remaining values across all queued blocks.
    available: u64,
    /// Highest value that has been queued so far; new blocks must start
    /// after it.
    high_water: u64,
}

/// A client-side generator handing out IDs from granted [`Block`]s.
///
/// Blocks are consumed in FIFO order. Within a block values are issued
/// sequentially, and when a block is used up the generator moves on to the
/// start of the next one. Because every block must start past everything
/// queued before it, the output of one generator is strictly increasing and
/// never repeats.
///
/// The generator never fetches blocks itself; that is the job of
/// [`crate::AllocationManager`], which refills it before it runs dry.
///
/// ## Features
/// - ✅ Thread-safe: `next` is guarded by an exclusive lock
/// - ✅ Blocks can be appended while other threads consume
///
/// ## Example
///
/// ```
/// use objectid::{Block, LocalGenerator};
///
/// let generator = LocalGenerator::new("user", 1);
/// generator.add_block(Block::new("user", 1, 9, 1, 2).unwrap()).unwrap();
/// generator.add_block(Block::new("user", 1, 9, 11, 11).unwrap()).unwrap();
///
/// let values: Vec<u64> = (0..3).map(|_| generator.next().unwrap().value).collect();
/// assert_eq!(values, [1, 2, 11]);
/// assert!(generator.next().is_err());
/// ```
#[derive(Debug)]
pub struct LocalGenerator {
    type_name: String,
    type_id: u32,
    state: Mutex<State>,
}

impl LocalGenerator {
    /// Creates an empty generator for one type.
    pub fn new(type_name: impl Into<String>, type_id: u32) -> Self {
        Self {
            type_name: type_name.into(),
            type_id,
            state: Mutex::new(State::default()),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub const fn type_id(&self) -> u32 {
        self.type_id
    }

    /// Number of values that can still be issued without another block.
    pub fn available(&self) -> u64 {
        self.state.lock().available
    }

    /// Number of blocks currently queued, including the partially used head.
    pub fn buffered_blocks(&self) -> usize {
        self.state.lock().blocks.len()
    }

    /// Appends a block behind the ones already queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the block belongs to another type,
    /// or does not start after every value queued so far.
    pub fn add_block(&self, block: Block) -> Result<()> {
        if block.type_id() != self.type_id || block.type_name() != self.type_name {
            return Err(Error::invalid(format!(
                "block for type '{}' ({}) cannot feed generator for '{}' ({})",
                block.type_name(),
                block.type_id(),
                self.type_name,
                self.type_id
            )));
        }

        let mut state = self.state.lock();
        if block.start() <= state.high_water {
            return Err(Error::invalid(format!(
                "block {}..={} for '{}' does not start after {}",
                block.start(),
                block.end(),
                self.type_name,
                state.high_water
            )));
        }

        if state.blocks.is_empty() {
            state.cursor = block.start();
        }
        state.available += block.size();
        state.high_water = block.end();
        state.blocks.push_back(block);
        Ok(())
    }

    /// Issues the next identifier.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Exhausted`] if no values are buffered. The state is
    /// left untouched, so adding a block makes the generator usable again.
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self), fields(type_name = %self.type_name)))]
    pub fn next(&self) -> Result<ObjectId> {
        let mut state = self.state.lock();
        let Some(head) = state.blocks.front() else {
            return Err(Error::Exhausted {
                type_name: self.type_name.clone(),
            });
        };

        let value = state.cursor;
        let source_id = head.source_id();
        debug_assert!(head.contains(value));

        if value == head.end() {
            state.blocks.pop_front();
            if let Some(next) = state.blocks.front() {
                state.cursor = next.start();
            }
        } else {
            state.cursor = value + 1;
        }
        state.available -= 1;

        Ok(ObjectId {
            value,
            type_id: self.type_id,
            source_id,
        })
    }
}
