//! Routes and request/response bodies shared by the server and the client.
//!
//! Types, blocks and identifiers themselves travel as the `serde`
//! representations defined in [`objectid`]. This module only adds the
//! envelopes that exist purely for the HTTP binding.

use core::time::Duration;

use objectid::SetupReport;
use serde::{Deserialize, Serialize};

/// `POST` (or `GET`): provision counters for every declared type.
pub const SETUP_PATH: &str = "/id/types/setup";

/// `GET`: list provisioned types.
pub const TYPES_PATH: &str = "/id/types";

/// `GET`: one provisioned type, by numeric id or by name.
pub const TYPE_PATH: &str = "/id/types/{key}";

/// `POST`: reserve a block of values. `{key}` is the type name.
pub const GENERATE_PATH: &str = "/id/types/{key}/generate_ids";

/// `GET`: liveness.
pub const HEALTH_PATH: &str = "/health";

/// Body of a block request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateBlockRequest {
    pub amount: u64,
}

/// Body of a setup response.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetupResponse {
    /// Types whose counters were created by this call.
    pub created: Vec<String>,
}

impl From<SetupReport> for SetupResponse {
    fn from(report: SetupReport) -> Self {
        Self {
            created: report.created,
        }
    }
}

/// The `{key}` segment of [`TYPE_PATH`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeKey {
    Id(u32),
    Name(String),
}

impl TypeKey {
    /// An all-digit key is a type id, anything else a type name.
    pub fn parse(key: &str) -> Self {
        if !key.is_empty() && key.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = key.parse() {
                return Self::Id(id);
            }
        }
        Self::Name(key.to_string())
    }
}

/// Path of the single-type route for `key`.
pub fn type_path(key: impl core::fmt::Display) -> String {
    format!("{TYPES_PATH}/{key}")
}

/// Path of the block route for `type_name`.
pub fn generate_path(type_name: &str) -> String {
    format!("{TYPES_PATH}/{type_name}/generate_ids")
}

/// `Cache-Control` value allowing clients to cache for `max_age`.
pub fn cache_control(max_age: Duration) -> String {
    format!("max-age={}", max_age.as_secs())
}

/// Reads the cache lifetime out of a `Cache-Control` value.
///
/// `no-cache` and `no-store` mean zero. Returns `None` when the header says
/// nothing about lifetime.
pub fn parse_max_age(header: &str) -> Option<Duration> {
    let mut max_age = None;
    for directive in header.split(',').map(str::trim) {
        let lower = directive.to_ascii_lowercase();
        if lower == "no-cache" || lower == "no-store" {
            return Some(Duration::ZERO);
        }
        if let Some(secs) = lower.strip_prefix("max-age=") {
            max_age = secs.trim_matches('"').parse().ok().map(Duration::from_secs);
        }
    }
    max_age
}
