//! Speech-to-text collaborator feeding recognized utterances to the dispatcher.

use crate::{audio, error::TransportError};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{AudioInput, AudioResponseFormat, CreateTranscriptionRequestArgs},
};
use async_trait::async_trait;
use tracing::{info, warn};

/// Turns a recorded audio clip (a WAV file) into text.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, TransportError>;
}

/// Transcribes a clip and returns the trimmed text, or `None` when nothing
/// was said. Callers pass the result straight to the dispatcher.
pub async fn recognize(
    stt: &dyn SpeechToText,
    audio: Vec<u8>,
) -> Result<Option<String>, TransportError> {
    let text = stt.transcribe(audio).await?;
    let text = text.trim();
    if text.is_empty() {
        warn!("No speech detected in audio");
        return Ok(None);
    }
    info!(recognized = %text, "Speech recognized");
    Ok(Some(text.to_string()))
}

/// A `SpeechToText` backed by an OpenAI-compatible transcription endpoint.
pub struct WhisperClient {
    client: Client<OpenAIConfig>,
    model: String,
    language: String,
}

impl WhisperClient {
    /// # Arguments
    ///
    /// * `config` - API key and base URL of the service.
    /// * `model` - Transcription model (e.g., "whisper-1").
    /// * `language` - ISO-639-1 code the audio is forced to (e.g., "en").
    pub fn new(config: OpenAIConfig, model: String, language: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            language,
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(&self, audio: Vec<u8>) -> Result<String, TransportError> {
        if !audio::looks_like_wav(&audio) {
            return Err(TransportError::InvalidAudio(
                "expected a RIFF/WAVE payload".to_string(),
            ));
        }
        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8("audio.wav".to_string(), audio))
            .model(&self.model)
            .language(&self.language)
            .response_format(AudioResponseFormat::Json)
            .build()?;
        let response = self.client.audio().transcribe(request).await?;
        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recognize_trims_text() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .times(1)
            .returning(|_| Ok("  open the front left door \n".to_string()));

        let text = recognize(&stt, vec![1, 2, 3]).await.unwrap();
        assert_eq!(text.as_deref(), Some("open the front left door"));
    }

    #[tokio::test]
    async fn test_recognize_blank_is_none() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe().returning(|_| Ok("   ".to_string()));
        assert_eq!(recognize(&stt, vec![]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_recognize_propagates_transport_error() {
        let mut stt = MockSpeechToText::new();
        stt.expect_transcribe()
            .returning(|_| Err(TransportError::Request("503".to_string())));
        let err = recognize(&stt, vec![]).await.unwrap_err();
        assert_eq!(err, TransportError::Request("503".to_string()));
    }

    #[tokio::test]
    async fn test_whisper_rejects_non_wav_payload() {
        let client = WhisperClient::new(
            OpenAIConfig::new().with_api_key("test"),
            "whisper-1".to_string(),
            "en".to_string(),
        );
        let err = client.transcribe(b"garbage".to_vec()).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidAudio(_)));
    }
}
