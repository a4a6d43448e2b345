//! Networking layer for caller/player sessions.
//!
//! Players find a caller over UDP discovery, then talk to it over TCP using
//! newline-delimited JSON records. Everything runs on tokio tasks.

/// Player-side session client and its connection state machine.
pub mod client;

/// UDP discovery requests, responses and the responder loop.
pub mod discovery;

/// Network error types.
pub mod errors;

/// Message types for the game channel.
pub mod messages;

/// Caller-side session server.
pub mod server;

/// Newline-delimited record framing.
pub mod utils;
