//! marquee-client: follow a marquee display from another process.
//!
//! [`connection::ClientSync`] keeps a WebSocket connection to the daemon
//! alive, mirrors every `state_update` into a [`mirror::ClientMirror`], and
//! sends the human's submit/cancel replies back.

pub mod connection;
pub mod error;
pub mod mirror;

/// Stable crate label used by bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "marquee-client"
}
