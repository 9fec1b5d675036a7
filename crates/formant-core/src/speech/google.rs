use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Deserialize;
use serde_json::json;
use ureq::Agent;

use crate::error::SynthesisError;
use crate::http::default_agent;

use super::Synthesizer;

const GOOGLE_TTS_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";
const DEFAULT_VOICE: &str = "en-US-Neural2-C";

/// Cloud text-to-speech adapter for the Google `text:synthesize` endpoint.
///
/// The service replies with base64-encoded audio; this adapter decodes it to
/// raw bytes for playback.
pub struct GoogleSynthesizer {
    agent: Agent,
    api_key: String,
    base_url: String,
    voice: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

impl GoogleSynthesizer {
    pub fn new(api_key: &str, voice: Option<&str>) -> Self {
        let base_url =
            std::env::var("GOOGLE_TTS_BASE_URL").unwrap_or_else(|_| GOOGLE_TTS_URL.into());
        Self {
            agent: default_agent(),
            api_key: api_key.to_string(),
            base_url,
            voice: voice.unwrap_or(DEFAULT_VOICE).to_string(),
        }
    }

    fn language_code(&self) -> String {
        // Voice names are "<lang>-<region>-<family>-<variant>".
        self.voice
            .splitn(3, '-')
            .take(2)
            .collect::<Vec<_>>()
            .join("-")
    }

    fn parse_response(body: &str) -> Result<Vec<u8>, SynthesisError> {
        let payload: SynthesizeResponse = serde_json::from_str(body)
            .map_err(|e| SynthesisError::InvalidResponse(e.to_string()))?;
        BASE64
            .decode(payload.audio_content.trim())
            .map_err(|e| SynthesisError::InvalidResponse(format!("bad audio encoding: {e}")))
    }
}

impl Synthesizer for GoogleSynthesizer {
    fn name(&self) -> &'static str {
        "google"
    }

    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError> {
        let body = json!({
            "input": { "text": text },
            "voice": { "languageCode": self.language_code(), "name": self.voice },
            "audioConfig": { "audioEncoding": "MP3" },
        });

        let response = self
            .agent
            .post(&self.base_url)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(body)
            .map_err(|e| SynthesisError::Network(format!("{e}")))?;

        let raw = response
            .into_body()
            .read_to_string()
            .map_err(|e| SynthesisError::Network(format!("{e}")))?;
        Self::parse_response(raw.trim())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_response_decodes_audio_content() {
        let body = r#"{"audioContent":"aGVsbG8="}"#;
        assert_eq!(GoogleSynthesizer::parse_response(body).unwrap(), b"hello");
    }

    #[test]
    fn parse_response_rejects_bad_base64() {
        let body = r#"{"audioContent":"not base64!!"}"#;
        assert!(GoogleSynthesizer::parse_response(body).is_err());
    }

    #[test]
    fn language_code_derived_from_voice_name() {
        let synth = GoogleSynthesizer::new("key", Some("en-GB-Neural2-A"));
        assert_eq!(synth.language_code(), "en-GB");
    }
}
