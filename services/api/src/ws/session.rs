//! Manages the WebSocket connection lifecycle for a dashboard client.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use cardash_core::{SessionError, TransportError, audio, speech};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast::error::RecvError};
use tracing::{Instrument, error, info, instrument, warn};
use uuid::Uuid;

type SharedSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
#[instrument(name = "ws_session", skip_all, fields(connection_id = %Uuid::new_v4()))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("New WebSocket connection.");
    let (socket_tx, socket_rx) = socket.split();
    let socket_tx = Arc::new(Mutex::new(socket_tx));

    if let Err(e) = run_client_session(state, socket_tx, socket_rx).await {
        error!(error = ?e, "WebSocket session terminated with error.");
    }
    info!("WebSocket connection closed.");
}

/// A push-to-talk clip being collected from binary frames.
#[derive(Debug)]
pub(crate) struct Recording {
    sample_rate: u32,
    samples: Vec<i16>,
    truncated: bool,
}

impl Recording {
    /// Opens a recording at the requested rate, or the default one.
    pub(crate) fn start(sample_rate: Option<u32>) -> Result<Self, TransportError> {
        let sample_rate =
            audio::validate_sample_rate(sample_rate.unwrap_or(audio::DEFAULT_SAMPLE_RATE))?;
        Ok(Self::new(sample_rate))
    }

    fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            samples: Vec::new(),
            truncated: false,
        }
    }

    /// Appends a frame of PCM16 bytes, dropping whatever exceeds the
    /// recording length cap.
    pub(crate) fn push_frame(&mut self, bytes: &[u8]) {
        let cap = audio::max_recording_samples(self.sample_rate, 1);
        let room = cap.saturating_sub(self.samples.len());
        let decoded = audio::decode_pcm16_le(bytes);
        if decoded.len() > room {
            if !self.truncated {
                warn!(
                    max_secs = audio::MAX_RECORDING_SECS,
                    "Recording reached its length cap, dropping further audio"
                );
            }
            self.truncated = true;
        }
        self.samples.extend(decoded.into_iter().take(room));
    }

    pub(crate) fn len(&self) -> usize {
        self.samples.len()
    }

    pub(crate) fn into_wav(self) -> Vec<u8> {
        audio::encode_wav(&self.samples, self.sample_rate, 1)
    }
}

/// The event loop for one connection.
///
/// Client messages and dispatcher events are handled side by side. Submissions
/// run on their own tasks so that events keep flowing while the session works.
async fn run_client_session(
    state: Arc<AppState>,
    socket_tx: SharedSink,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    let mut events_rx = state.session.subscribe();
    send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::Initialized {
            snapshot: state.session.snapshot(),
        },
    )
    .await?;

    let mut recording: Option<Recording> = None;

    loop {
        tokio::select! {
            msg_result = socket_rx.next() => {
                let Some(msg_result) = msg_result else {
                    info!("Client stream ended.");
                    break;
                };
                match msg_result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                        Ok(ClientMessage::UserMessage { text }) => {
                            spawn_submission(&state, &socket_tx, text);
                        }
                        Ok(ClientMessage::StartRecording { sample_rate }) => {
                            if recording.take().is_some() {
                                warn!("Recording restarted, discarding the previous clip.");
                            }
                            let reply = match Recording::start(sample_rate) {
                                Ok(clip) => {
                                    let sample_rate = clip.sample_rate;
                                    recording = Some(clip);
                                    ServerMessage::RecordingStarted { sample_rate }
                                }
                                Err(e) => {
                                    warn!(error = %e, "Rejected recording request.");
                                    ServerMessage::Error { message: e.to_string() }
                                }
                            };
                            send_msg(&mut *socket_tx.lock().await, reply).await?;
                        }
                        Ok(ClientMessage::StopRecording) => match recording.take() {
                            Some(clip) => {
                                send_msg(
                                    &mut *socket_tx.lock().await,
                                    ServerMessage::RecordingStopped {
                                        samples: clip.len(),
                                        truncated: clip.truncated,
                                    },
                                )
                                .await?;
                                spawn_voice_submission(&state, &socket_tx, clip);
                            }
                            None => warn!("Received stop_recording without an active recording."),
                        },
                        Err(e) => {
                            warn!(error = %e, "Ignoring malformed client message.");
                            send_msg(
                                &mut *socket_tx.lock().await,
                                ServerMessage::Error {
                                    message: format!("Invalid message: {}", e),
                                },
                            )
                            .await?;
                        }
                    },
                    Ok(Message::Binary(data)) => match recording.as_mut() {
                        Some(clip) => clip.push_frame(&data),
                        None => warn!("Received audio data from client, but no recording is active."),
                    },
                    Ok(Message::Close(_)) => {
                        info!("Client sent close frame.");
                        break;
                    }
                    Ok(Message::Ping(_) | Message::Pong(_)) => {}
                    Err(e) => {
                        error!("Error receiving from client WebSocket: {:?}", e);
                        break;
                    }
                }
            },
            event = events_rx.recv() => match event {
                Ok(event) => {
                    send_msg(&mut *socket_tx.lock().await, ServerMessage::Event { event }).await?;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Client fell behind on dispatcher events.");
                }
                Err(RecvError::Closed) => {
                    info!("Dispatcher session closed.");
                    break;
                }
            },
        }
    }
    Ok(())
}

fn spawn_submission(state: &Arc<AppState>, socket_tx: &SharedSink, text: String) {
    let state = state.clone();
    let socket_tx = socket_tx.clone();
    tokio::spawn(
        async move {
            if let Err(e) = state.session.submit(text).await {
                report_error(&socket_tx, e).await;
            }
        }
        .in_current_span(),
    );
}

fn spawn_voice_submission(state: &Arc<AppState>, socket_tx: &SharedSink, clip: Recording) {
    let state = state.clone();
    let socket_tx = socket_tx.clone();
    tokio::spawn(
        async move {
            let result: Result<(), SessionError> = async {
                let Some(text) = speech::recognize(state.speech.as_ref(), clip.into_wav()).await?
                else {
                    return Ok(());
                };
                if let Err(e) = send_msg(
                    &mut *socket_tx.lock().await,
                    ServerMessage::Transcription { text: text.clone() },
                )
                .await
                {
                    warn!(error = ?e, "Failed to send transcription to client.");
                }
                state.session.submit(text).await?;
                Ok(())
            }
            .await;
            if let Err(e) = result {
                report_error(&socket_tx, e).await;
            }
        }
        .in_current_span(),
    );
}

async fn report_error(socket_tx: &SharedSink, err: SessionError) {
    warn!(error = %err, "Submission failed.");
    let msg = ServerMessage::Error {
        message: err.to_string(),
    };
    if let Err(e) = send_msg(&mut *socket_tx.lock().await, msg).await {
        warn!(error = ?e, "Failed to report error to client.");
    }
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pcm_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_recording_collects_frames() {
        let mut clip = Recording::start(None).unwrap();
        clip.push_frame(&pcm_bytes(&[1, 2]));
        clip.push_frame(&pcm_bytes(&[3]));

        assert_eq!(clip.len(), 3);
        assert!(!clip.truncated);
        let wav = clip.into_wav();
        assert!(audio::looks_like_wav(&wav));
        assert_eq!(&wav[audio::WAV_HEADER_LEN..], pcm_bytes(&[1, 2, 3]).as_slice());
    }

    #[test]
    fn test_recording_start_checks_sample_rate() {
        assert_eq!(
            Recording::start(None).unwrap().sample_rate,
            audio::DEFAULT_SAMPLE_RATE
        );
        assert_eq!(Recording::start(Some(48_000)).unwrap().sample_rate, 48_000);
        for rate in [0, 4_000, 96_000, 3_000_000_000] {
            assert!(matches!(
                Recording::start(Some(rate)),
                Err(TransportError::InvalidAudio(_))
            ));
        }
    }

    #[test]
    fn test_recording_stops_at_length_cap() {
        let mut clip = Recording::start(Some(8_000)).unwrap();
        let cap = audio::max_recording_samples(8_000, 1);
        clip.push_frame(&pcm_bytes(&vec![5; cap - 2]));
        assert!(!clip.truncated);

        clip.push_frame(&pcm_bytes(&[6, 6, 6, 6]));
        assert_eq!(clip.len(), cap);
        assert!(clip.truncated);

        clip.push_frame(&pcm_bytes(&[7]));
        assert_eq!(clip.len(), cap);
    }
}
