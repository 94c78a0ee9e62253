#![doc = include_str!("../README.md")]

mod allocator;
mod error;
mod generator;
mod manager;
mod store;
mod types;

pub use crate::allocator::*;
pub use crate::error::*;
pub use crate::generator::*;
pub use crate::manager::*;
pub use crate::store::*;
pub use crate::types::*;
