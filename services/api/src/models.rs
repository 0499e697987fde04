//! API Models
//!
//! Request and response bodies of the REST API, annotated for OpenAPI
//! documentation with `utoipa`. Core types are embedded as opaque objects.

use cardash_core::DispatchOutcome;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, Serialize, ToSchema, Debug)]
pub struct CommandPayload {
    /// The recognized or typed utterance.
    #[schema(example = "open the front left door")]
    pub text: String,
}

#[derive(Deserialize, IntoParams, Debug, Default)]
pub struct TranscriptionParams {
    /// Sample rate of a raw `audio/pcm` body, 8000 to 48000 Hz. Ignored for WAV bodies.
    pub sample_rate: Option<u32>,
}

#[derive(Serialize, ToSchema, Debug)]
pub struct TranscriptionResponse {
    /// The recognized text, absent when no speech was detected.
    pub text: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub outcome: Option<DispatchOutcome>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ErrorResponse {
    pub message: String,
}
