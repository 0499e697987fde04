//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the handle to the
//! dispatcher session and the speech-to-text client shared by all handlers.

use cardash_core::{SessionHandle, speech::SpeechToText};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    pub speech: Arc<dyn SpeechToText>,
}
