//! MCP protocol types used by the stdio host

mod messages;
mod types;

pub use messages::*;
pub use types::*;

/// Newest supported MCP protocol version
pub const PROTOCOL_VERSION: &str = "2025-11-25";

/// Supported protocol versions, newest first
pub const SUPPORTED_VERSIONS: &[&str] = &[PROTOCOL_VERSION, "2025-06-18", "2025-03-26", "2024-11-05"];

/// Pick the protocol version answered to a client.
///
/// A supported client version is echoed back; anything else gets the newest.
#[must_use]
pub fn negotiate_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_VERSIONS.iter().copied().find(|s| *s == v))
        .unwrap_or(PROTOCOL_VERSION)
}
