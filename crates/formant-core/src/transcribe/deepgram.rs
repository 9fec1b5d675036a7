use log::warn;
use serde::Deserialize;
use ureq::Agent;

use crate::error::{DegradeReason, TranscribeError};
use crate::http::default_agent;

use super::{
    AudioClip, FAILURE_TRANSCRIPT, PLACEHOLDER_TRANSCRIPT, Transcriber, Transcript, validate_clip,
};

const DEEPGRAM_LISTEN_URL: &str = "https://api.deepgram.com/v1/listen";
const DEFAULT_MODEL: &str = "nova-2";
const DEFAULT_LANGUAGE: &str = "en";

/// Cloud speech-to-text adapter for the Deepgram listen API.
///
/// With no API key configured it degrades to a fixed placeholder transcript
/// and issues zero network calls.
pub struct DeepgramTranscriber {
    agent: Agent,
    api_key: Option<String>,
    base_url: String,
    model: String,
    language: String,
    punctuate: bool,
}

#[derive(Deserialize)]
struct ListenResponse {
    results: Option<ListenResults>,
}

#[derive(Deserialize)]
struct ListenResults {
    channels: Vec<ListenChannel>,
}

#[derive(Deserialize)]
struct ListenChannel {
    alternatives: Vec<ListenAlternative>,
}

#[derive(Deserialize)]
struct ListenAlternative {
    transcript: String,
}

impl DeepgramTranscriber {
    pub fn new(api_key: Option<&str>, model: Option<&str>) -> Self {
        let api_key = api_key
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let base_url =
            std::env::var("DEEPGRAM_BASE_URL").unwrap_or_else(|_| DEEPGRAM_LISTEN_URL.into());
        Self {
            agent: default_agent(),
            api_key,
            base_url,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            punctuate: true,
        }
    }

    pub fn with_language(mut self, language: &str, punctuate: bool) -> Self {
        self.language = language.to_string();
        self.punctuate = punctuate;
        self
    }

    fn request(&self, api_key: &str, clip: &AudioClip) -> Result<String, TranscribeError> {
        let response = self
            .agent
            .post(&self.base_url)
            .query("model", self.model.as_str())
            .query("language", self.language.as_str())
            .query("punctuate", if self.punctuate { "true" } else { "false" })
            .query("sample_rate", clip.sample_rate.to_string().as_str())
            .header("Authorization", &format!("Bearer {api_key}"))
            .header("Content-Type", clip.format.mime())
            .send(clip.bytes.as_slice())
            .map_err(|e| TranscribeError::Network(format!("{e}")))?;

        let raw = response
            .into_body()
            .read_to_string()
            .map_err(|e| TranscribeError::Network(format!("{e}")))?;
        Self::parse_response(raw.trim())
    }

    fn parse_response(body: &str) -> Result<String, TranscribeError> {
        let payload: ListenResponse = serde_json::from_str(body)
            .map_err(|e| TranscribeError::InvalidResponse(e.to_string()))?;
        let transcript = payload
            .results
            .and_then(|results| results.channels.into_iter().next())
            .and_then(|channel| channel.alternatives.into_iter().next())
            .map(|alternative| alternative.transcript.trim().to_string())
            .ok_or_else(|| TranscribeError::InvalidResponse("no transcript in response".into()))?;
        Ok(transcript)
    }
}

impl Transcriber for DeepgramTranscriber {
    fn name(&self) -> &'static str {
        "deepgram"
    }

    fn transcribe(&self, clip: &AudioClip) -> Result<Transcript, TranscribeError> {
        validate_clip(clip)?;

        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Transcript {
                text: PLACEHOLDER_TRANSCRIPT.to_string(),
                degraded: Some(DegradeReason::MissingCredential),
            });
        };

        match self.request(api_key, clip) {
            Ok(text) => Ok(Transcript {
                text,
                degraded: None,
            }),
            Err(err) => {
                warn!("transcription request failed: {err}");
                Ok(Transcript {
                    text: FAILURE_TRANSCRIPT.to_string(),
                    degraded: Some(DegradeReason::ServiceFailed),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transcribe::AudioFormat;

    fn wav_clip() -> AudioClip {
        AudioClip {
            bytes: vec![0u8; 64],
            format: AudioFormat::Wav,
            sample_rate: 16_000,
        }
    }

    #[test]
    fn missing_credential_returns_placeholder_without_network() {
        // A real request would return ServiceFailed here; MissingCredential
        // proves the adapter bailed before touching the network.
        let transcriber = DeepgramTranscriber::new(None, None);
        let transcript = transcriber.transcribe(&wav_clip()).unwrap();
        assert_eq!(transcript.text, PLACEHOLDER_TRANSCRIPT);
        assert_eq!(transcript.degraded, Some(DegradeReason::MissingCredential));
    }

    #[test]
    fn blank_credential_counts_as_missing() {
        let transcriber = DeepgramTranscriber::new(Some("   "), None);
        let transcript = transcriber.transcribe(&wav_clip()).unwrap();
        assert_eq!(transcript.degraded, Some(DegradeReason::MissingCredential));
    }

    #[test]
    fn validation_runs_before_credential_fallback() {
        let transcriber = DeepgramTranscriber::new(None, None);
        let empty = AudioClip {
            bytes: Vec::new(),
            format: AudioFormat::Wav,
            sample_rate: 16_000,
        };
        assert!(matches!(
            transcriber.transcribe(&empty),
            Err(TranscribeError::InvalidAudio)
        ));
    }

    #[test]
    fn parse_response_extracts_best_transcript() {
        let body = r#"{"results":{"channels":[{"alternatives":[{"transcript":" hello there "}]}]}}"#;
        assert_eq!(
            DeepgramTranscriber::parse_response(body).unwrap(),
            "hello there"
        );
    }

    #[test]
    fn parse_response_rejects_missing_results() {
        assert!(DeepgramTranscriber::parse_response("{}").is_err());
        assert!(DeepgramTranscriber::parse_response("not json").is_err());
    }

    #[test]
    fn transcriber_moves_across_threads() {
        fn assert_send<T: Send>(_: &T) {}
        assert_send(&DeepgramTranscriber::new(Some("key"), None));
    }
}
