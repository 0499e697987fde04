//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests that drive the
//! dispatcher session. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use cardash_core::{
    ActionDescriptor, SessionError, TransportError, VehicleState, audio,
    conversation::ConversationTurn, speech,
};
use std::sync::Arc;
use tracing::warn;

use crate::{
    models::{CommandPayload, ErrorResponse, TranscriptionParams, TranscriptionResponse},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    Busy,
    BadGateway(String),
    ServiceUnavailable,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Busy => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(ErrorResponse {
                    message: SessionError::Busy.to_string(),
                }),
            )
                .into_response(),
            ApiError::BadGateway(message) => {
                warn!(%message, "Upstream service failed");
                (StatusCode::BAD_GATEWAY, Json(ErrorResponse { message })).into_response()
            }
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse {
                    message: SessionError::Closed.to_string(),
                }),
            )
                .into_response(),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Busy => ApiError::Busy,
            SessionError::Closed => ApiError::ServiceUnavailable,
            SessionError::Transport(e) => e.into(),
        }
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::InvalidAudio(message) => ApiError::BadRequest(message),
            other => ApiError::BadGateway(other.to_string()),
        }
    }
}

/// Dispatch a typed or recognized utterance.
#[utoipa::path(
    post,
    path = "/commands",
    request_body = CommandPayload,
    responses(
        (status = 200, description = "Utterance dispatched; body is the dispatch outcome"),
        (status = 204, description = "Empty utterance ignored"),
        (status = 429, description = "A command is in progress and another is queued", body = ErrorResponse),
        (status = 502, description = "Reasoning service failed", body = ErrorResponse)
    )
)]
pub async fn post_command(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CommandPayload>,
) -> Result<Response, ApiError> {
    match state.session.submit(payload.text).await? {
        Some(outcome) => Ok((StatusCode::OK, Json(outcome)).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// Transcribe a voice command and dispatch the recognized text.
///
/// The body is either a WAV file (`audio/wav`) or raw little-endian 16-bit
/// mono PCM (`audio/pcm`) recorded at `sample_rate`.
#[utoipa::path(
    post,
    path = "/transcriptions",
    params(TranscriptionParams),
    request_body(content = Vec<u8>, content_type = "audio/wav"),
    responses(
        (status = 200, description = "Recognized text and dispatch outcome", body = TranscriptionResponse),
        (status = 400, description = "Unsupported or malformed audio", body = ErrorResponse),
        (status = 429, description = "A command is in progress and another is queued", body = ErrorResponse),
        (status = 502, description = "Speech or reasoning service failed", body = ErrorResponse)
    )
)]
pub async fn post_transcription(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TranscriptionParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TranscriptionResponse>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("audio/wav");
    let wav = wav_from_body(content_type, params.sample_rate, &body)?;

    let text = speech::recognize(state.speech.as_ref(), wav).await?;
    let outcome = match &text {
        Some(text) => state.session.submit(text.clone()).await?,
        None => None,
    };
    Ok(Json(TranscriptionResponse { text, outcome }))
}

/// Normalizes an uploaded clip into a WAV file, enforcing the recording cap
/// on raw PCM.
pub(crate) fn wav_from_body(
    content_type: &str,
    sample_rate: Option<u32>,
    body: &[u8],
) -> Result<Vec<u8>, ApiError> {
    match content_type.split(';').next().unwrap_or_default().trim() {
        "audio/wav" | "audio/wave" | "audio/x-wav" => {
            if !audio::looks_like_wav(body) {
                return Err(ApiError::BadRequest(
                    "Body is not a RIFF/WAVE file".to_string(),
                ));
            }
            Ok(body.to_vec())
        }
        "audio/pcm" | "application/octet-stream" => {
            let sample_rate =
                audio::validate_sample_rate(sample_rate.unwrap_or(audio::DEFAULT_SAMPLE_RATE))?;
            let mut samples = audio::decode_pcm16_le(body);
            samples.truncate(audio::max_recording_samples(sample_rate, 1));
            Ok(audio::encode_wav(&samples, sample_rate, 1))
        }
        other => Err(ApiError::BadRequest(format!(
            "Unsupported content type '{}'",
            other
        ))),
    }
}

/// Current guard and tuning state of the vehicle.
#[utoipa::path(
    get,
    path = "/vehicle",
    responses((status = 200, description = "Vehicle state"))
)]
pub async fn get_vehicle(State(state): State<Arc<AppState>>) -> Json<VehicleState> {
    Json(state.session.snapshot().vehicle)
}

/// The conversation transcript, oldest turn first.
#[utoipa::path(
    get,
    path = "/transcript",
    responses((status = 200, description = "Conversation turns"))
)]
pub async fn get_transcript(State(state): State<Arc<AppState>>) -> Json<Vec<ConversationTurn>> {
    Json(state.session.snapshot().transcript)
}

/// The catalog of actions offered to the reasoning service.
#[utoipa::path(
    get,
    path = "/actions",
    responses((status = 200, description = "Action catalog"))
)]
pub async fn list_actions() -> Json<Vec<ActionDescriptor>> {
    Json(
        cardash_core::VehicleAction::ALL
            .into_iter()
            .map(cardash_core::VehicleAction::descriptor)
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_body_passes_through() {
        let wav = audio::encode_wav(&[1, 2, 3], 16000, 1);
        let out = wav_from_body("audio/wav", None, &wav).ok().unwrap();
        assert_eq!(out, wav);
    }

    #[test]
    fn test_pcm_body_is_wrapped_and_capped() {
        let cap = audio::max_recording_samples(8_000, 1);
        let samples = vec![7i16; cap + 30];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let out = wav_from_body("audio/pcm; charset=binary", Some(8_000), &bytes)
            .ok()
            .unwrap();

        assert!(audio::looks_like_wav(&out));
        assert_eq!(out.len(), audio::WAV_HEADER_LEN + cap * 2);
    }

    #[test]
    fn test_bad_bodies_are_rejected() {
        assert!(matches!(
            wav_from_body("audio/wav", None, b"nope"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            wav_from_body("text/plain", None, b"hello"),
            Err(ApiError::BadRequest(_))
        ));
        assert!(matches!(
            wav_from_body("audio/pcm", Some(0), &[0, 0]),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn test_out_of_range_sample_rate_is_rejected() {
        for rate in [7_999, 48_001, 3_000_000_000] {
            assert!(matches!(
                wav_from_body("audio/pcm", Some(rate), &[0, 0, 1, 0]),
                Err(ApiError::BadRequest(_))
            ));
        }
    }

    #[test]
    fn test_session_errors_map_to_status_codes() {
        let status = |err: SessionError| ApiError::from(err).into_response().status();
        assert_eq!(status(SessionError::Busy), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(status(SessionError::Closed), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            status(SessionError::Transport(TransportError::EmptyResponse)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(SessionError::Transport(TransportError::InvalidAudio(
                "x".to_string()
            ))),
            StatusCode::BAD_REQUEST
        );
    }
}
