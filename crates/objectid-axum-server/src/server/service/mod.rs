//! HTTP service implementation.
//!
//! ## Structure
//!
//! - [`handler`] - axum router and request handlers (`IdService`).

pub mod handler;
