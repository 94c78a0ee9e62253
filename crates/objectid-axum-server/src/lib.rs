//! Library half of `objectid-axum-server`: configuration, telemetry and the
//! axum router. The binary wires them together; integration tests mount the
//! router directly.

pub mod server;
