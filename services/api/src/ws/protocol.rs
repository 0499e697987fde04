//! Defines the WebSocket message protocol between the dashboard client and the API server.

use cardash_core::{DispatchEvent, SessionSnapshot};
use serde::{Deserialize, Serialize};

/// Messages sent from the client to the server.
///
/// Audio is not part of this enum: while recording, the client streams binary
/// frames of little-endian 16-bit mono PCM.
#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A typed utterance for the dispatcher.
    UserMessage { text: String },
    /// Starts a push-to-talk recording at the given sample rate.
    StartRecording { sample_rate: Option<u32> },
    /// Ends the recording and submits it for transcription.
    StopRecording,
}

/// Messages sent from the server to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once on connect with the current session state.
    Initialized { snapshot: SessionSnapshot },
    /// A dispatcher event, forwarded as it happens.
    Event { event: DispatchEvent },
    RecordingStarted { sample_rate: u32 },
    /// The recording was closed; `truncated` is set when it hit the length cap.
    RecordingStopped { samples: usize, truncated: bool },
    /// The text recognized from the last recording.
    Transcription { text: String },
    /// Reports a failed request to the client. The connection stays open.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardash_core::DispatcherState;

    #[test]
    fn test_client_messages_parse() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type": "user_message", "text": "start the engine"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::UserMessage {
                text: "start the engine".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "start_recording"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StartRecording { sample_rate: None });

        let msg: ClientMessage = serde_json::from_str(r#"{"type": "stop_recording"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StopRecording);
    }

    #[test]
    fn test_unknown_client_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type": "init"}"#).is_err());
    }

    #[test]
    fn test_events_are_nested_under_their_own_tag() {
        let msg = ServerMessage::Event {
            event: DispatchEvent::StateChanged {
                state: DispatcherState::Idle,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "event");
        assert_eq!(json["event"]["type"], "state_changed");
    }
}
