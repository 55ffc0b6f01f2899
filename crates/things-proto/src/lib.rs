//! Wire model shared by the spotifythings client crates: socket envelopes,
//! typed events and commands, HTTP bodies, configuration.

pub mod api;
pub mod config;
pub mod platform;
pub mod protocol;
