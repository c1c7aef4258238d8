//! chat-relay: a two-party chat relay over length-prefixed TCP frames.
//!
//! A server accepts connections, swaps handles with each client, then
//! alternates turns: the client sends a message, the local operator types a
//! reply. Either side ends a conversation by sending [`QUIT_SENTINEL`].
//!
//! Modules:
//! - `codec`: `[u32 big-endian length][payload]` framing
//! - `console`: lock-protected console output shared by sessions
//! - `operator`: single queue for the operator's typed replies
//! - `session`: per-connection state machine
//! - `server`: listener and accept loop
//! - `client`: the interactive peer
//! - `config`: CLI arguments and TOML file

pub mod client;
pub mod codec;
pub mod config;
pub mod console;
pub mod operator;
pub mod server;
pub mod session;

/// Payload that ends a conversation when sent by either side.
pub const QUIT_SENTINEL: &str = "\\quit";
