//! WebSocket Sessions
//!
//! Real-time access to the shared dispatcher session. It is split into
//! submodules:
//!
//! - `protocol`: The JSON message format for client-server communication.
//! - `session`: The connection lifecycle, push-to-talk recording, and the
//!   forwarding of dispatcher events to the client.

pub mod protocol;
pub mod session;

pub use session::ws_handler;
