use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A named, numbered identifier category with its own counter per source.
///
/// Types are declared in configuration and become servable once their
/// counter has been provisioned. They never change afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IdType {
    /// Unique lowercase name, e.g. `user` or `order_item`.
    pub name: String,
    /// Free-form description for operators.
    pub description: String,
    /// Unique numeric id embedded in every [`ObjectId`] of this type.
    pub id: u32,
    /// The allocation authority this instance of the type belongs to.
    pub source: u64,
}

/// A type as declared in configuration, before a source is attached.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TypeDeclaration {
    pub name: String,
    pub id: u32,
    pub description: String,
}

impl TypeDeclaration {
    pub fn new(name: impl Into<String>, id: u32, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id,
            description: description.into(),
        }
    }
}

/// A contiguous, inclusive range of values reserved for exclusive use.
///
/// Blocks are only produced by the allocator after the counter has been
/// durably advanced past `end`, so no other block for the same type and
/// source can ever overlap it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Block {
    type_name: String,
    type_id: u32,
    source_id: u64,
    #[cfg_attr(feature = "serde", serde(rename = "start_value"))]
    start: u64,
    #[cfg_attr(feature = "serde", serde(rename = "end_value"))]
    end: u64,
}

impl Block {
    /// Creates a block, validating its shape.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the name is empty, an id is zero,
    /// `start` is zero, or `end < start`.
    pub fn new(
        type_name: impl Into<String>,
        type_id: u32,
        source_id: u64,
        start: u64,
        end: u64,
    ) -> Result<Self> {
        let type_name = type_name.into();
        if type_name.is_empty() {
            return Err(Error::invalid("block type name must not be empty"));
        }
        if type_id == 0 {
            return Err(Error::invalid(format!(
                "block type id for '{type_name}' must be greater than 0"
            )));
        }
        if source_id == 0 {
            return Err(Error::invalid(format!(
                "block source id for '{type_name}' must be greater than 0"
            )));
        }
        if start == 0 {
            return Err(Error::invalid(format!(
                "block start for '{type_name}' must be greater than 0"
            )));
        }
        if end < start {
            return Err(Error::invalid(format!(
                "block end {end} is before start {start} for '{type_name}'"
            )));
        }
        Ok(Self {
            type_name,
            type_id,
            source_id,
            start,
            end,
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub const fn type_id(&self) -> u32 {
        self.type_id
    }

    pub const fn source_id(&self) -> u64 {
        self.source_id
    }

    /// First value of the block (inclusive).
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Last value of the block (inclusive).
    pub const fn end(&self) -> u64 {
        self.end
    }

    /// Number of values in the block. Never zero.
    pub const fn size(&self) -> u64 {
        self.end - self.start + 1
    }

    pub const fn contains(&self, value: u64) -> bool {
        value >= self.start && value <= self.end
    }

    /// Re-checks the invariants of a block that arrived over the wire, where
    /// the validating constructor was bypassed by deserialization.
    pub fn validate(self) -> Result<Self> {
        Self::new(
            self.type_name,
            self.type_id,
            self.source_id,
            self.start,
            self.end,
        )
    }
}

/// A single issued identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectId {
    pub value: u64,
    pub type_id: u32,
    pub source_id: u64,
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.value, self.type_id, self.source_id)
    }
}

/// Addresses one durable counter: a type as served by one source.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CounterKey {
    pub source_id: u64,
    pub type_id: u32,
    pub type_name: String,
}

impl CounterKey {
    pub fn new(source_id: u64, type_id: u32, type_name: impl Into<String>) -> Self {
        Self {
            source_id,
            type_id,
            type_name: type_name.into(),
        }
    }

    /// Record name used by file-backed stores.
    pub fn file_name(&self) -> String {
        format!(
            "{}.{}.{}.details",
            self.source_id, self.type_id, self.type_name
        )
    }
}

impl From<&IdType> for CounterKey {
    fn from(ty: &IdType) -> Self {
        Self::new(ty.source, ty.id, ty.name.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_rejects_bad_shapes() {
        assert!(Block::new("", 1, 1, 1, 1).is_err());
        assert!(Block::new("user", 0, 1, 1, 1).is_err());
        assert!(Block::new("user", 1, 0, 1, 1).is_err());
        assert!(Block::new("user", 1, 1, 0, 1).is_err());
        assert!(Block::new("user", 1, 1, 5, 4).is_err());
    }

    #[test]
    fn block_size_is_inclusive() {
        let block = Block::new("user", 1, 7, 6, 10).unwrap();
        assert_eq!(block.size(), 5);
        assert!(block.contains(6));
        assert!(block.contains(10));
        assert!(!block.contains(11));

        let single = Block::new("user", 1, 7, 42, 42).unwrap();
        assert_eq!(single.size(), 1);
    }

    #[test]
    fn counter_key_file_name_orders_source_id_name() {
        let key = CounterKey::new(3, 12, "order_item");
        assert_eq!(key.file_name(), "3.12.order_item.details");
    }

    #[test]
    fn object_id_display() {
        let id = ObjectId {
            value: 99,
            type_id: 2,
            source_id: 1,
        };
        assert_eq!(id.to_string(), "99:2:1");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn block_uses_wire_field_names() {
        let block = Block::new("user", 1, 7, 6, 10).unwrap();
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type_name"], "user");
        assert_eq!(json["start_value"], 6);
        assert_eq!(json["end_value"], 10);

        let back: Block = serde_json::from_value(json).unwrap();
        assert_eq!(back.validate().unwrap(), block);
    }
}
