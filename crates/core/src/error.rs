//! Error types shared by the dispatcher, the action registry and the
//! external service clients.

use async_openai::error::OpenAIError;
use std::time::Duration;

/// A failure talking to an external service (reasoning or speech-to-text).
///
/// Transport errors never corrupt a session: the dispatcher reports them and
/// returns to idle with the conversation history still valid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("Request to external service failed: {0}")]
    Request(String),
    #[error("External service did not answer within {0:?}")]
    Timeout(Duration),
    #[error("External service returned no usable message")]
    EmptyResponse,
    #[error("Audio payload rejected: {0}")]
    InvalidAudio(String),
}

impl From<OpenAIError> for TransportError {
    fn from(err: OpenAIError) -> Self {
        Self::Request(err.to_string())
    }
}

/// Returned by the action registry when an identifier is not in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown action: '{0}'")]
pub struct UnknownAction(pub String);

/// Errors surfaced by a running dispatcher session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("A command is already in progress and another is queued")]
    Busy,
    #[error("The dispatcher session has shut down")]
    Closed,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            UnknownAction("fly".to_string()).to_string(),
            "Unknown action: 'fly'"
        );
        assert_eq!(
            TransportError::Timeout(Duration::from_secs(2)).to_string(),
            "External service did not answer within 2s"
        );
        assert_eq!(
            SessionError::Transport(TransportError::EmptyResponse).to_string(),
            "External service returned no usable message"
        );
    }

    #[test]
    fn test_openai_error_maps_to_request() {
        let err: TransportError = OpenAIError::InvalidArgument("bad model".to_string()).into();
        match err {
            TransportError::Request(msg) => assert!(msg.contains("bad model")),
            other => panic!("Expected Request, got {other:?}"),
        }
    }
}
