//! Cardash API Library Crate
//!
//! This library contains the web-facing side of the command dispatcher:
//! configuration, the application state, REST handlers, the WebSocket
//! push-to-talk endpoint, and routing. The `api` binary is a thin wrapper
//! around this library.

pub mod config;
pub mod handlers;
pub mod models;
pub mod router;
pub mod state;
pub mod ws;
