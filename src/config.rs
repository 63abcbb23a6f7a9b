//! Tunable limits and defaults, gathered in one place the way the teacher's
//! `WebSocketConfig` does, minus the extension type parameter (compression is a
//! Non-goal — see SPEC_FULL.md §1).

use std::time::Duration;

/// The accept timeout the source's initial implementation used (1.0s) before a later
/// revision raised it to 5.0s. This crate adopts the more recent value but keeps it
/// configurable — see SPEC_FULL.md §9.
pub const DEFAULT_ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a connection may sit in `ClosingLocal` awaiting the peer's answering Close
/// frame before this side gives up and closes anyway.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration shared by every [`crate::connection::Connection`] a
/// [`crate::server::Server`] creates.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Maximum bytes of HTTP header accepted before a handshake is rejected with 413.
    pub max_handshake_bytes: usize,
    /// How long a connection may remain in `AwaitingHandshake` before it is closed with
    /// `HANDSHAKE_TIMEOUT`.
    pub handshake_timeout: Duration,
    /// How long a connection may remain in `ClosingLocal` waiting for the peer's Close
    /// before this side closes unilaterally.
    pub close_timeout: Duration,
    /// Maximum size, in bytes, of a fully reassembled message (after defragmentation).
    pub max_message_size: Option<usize>,
    /// Maximum bytes read from, or written to, one connection's stream per multiplexer
    /// tick. Bounds how much one busy connection can starve its peers.
    pub per_tick_byte_budget: usize,
    /// String sent back in the handshake response's `Server` header and in error pages.
    pub server_identifier: String,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            max_handshake_bytes: 8192,
            handshake_timeout: DEFAULT_ACCEPT_TIMEOUT,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            max_message_size: Some(64 << 20),
            per_tick_byte_budget: 16384,
            server_identifier: concat!("wsreactor/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
