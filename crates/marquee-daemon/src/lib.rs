//! marquee-daemon: serves the shared display to UI clients and agents.
//!
//! The [`hub::SessionHub`] serialises every mutation of the session and
//! publishes the resulting snapshot through [`broadcast::StateBroadcaster`].
//! Clients connect over WebSocket ([`ws`]); agents talk JSON lines over stdio
//! ([`agent`]).

pub mod agent;
pub mod bootstrap;
pub mod broadcast;
pub mod hub;
pub mod server;
pub mod ws;

/// Stable crate label used by bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "marquee-daemon"
}
