#![doc = include_str!("../README.md")]

mod client;
mod common;

pub use client::*;
pub use common::*;
// Public re-export so downstream crates can access `objectid` via
// `objectid_axum_core::objectid`
pub use objectid;
