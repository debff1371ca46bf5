//! marquee-core: the shared display session an agent drives and a human watches.
//!
//! This crate holds the synchronous core: the display state machine with its
//! undo history, the action catalog derived from it, the human-input request
//! lifecycle, the snapshot/wire types broadcast to clients, agent call parsing,
//! and configuration. Nothing here performs I/O beyond loading config files.

pub mod action;
pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod session;
pub mod snapshot;
pub mod tools;

/// Crate identity label used by bootstrap smoke tests.
pub fn crate_label() -> &'static str {
    "marquee-core"
}
