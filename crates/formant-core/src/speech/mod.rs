pub mod google;

pub use google::GoogleSynthesizer;

use crate::error::SynthesisError;

/// Text-to-speech adapter abstraction.
///
/// Synthesis is best-effort everywhere it is used: callers degrade to
/// "no audio" on any error.
pub trait Synthesizer: Send {
    fn name(&self) -> &'static str;
    fn synthesize(&self, text: &str) -> Result<Vec<u8>, SynthesisError>;
}

/// Synthesizer used when no TTS credential is configured.
pub struct NullSynthesizer;

impl Synthesizer for NullSynthesizer {
    fn name(&self) -> &'static str {
        "null"
    }

    fn synthesize(&self, _text: &str) -> Result<Vec<u8>, SynthesisError> {
        Err(SynthesisError::Disabled)
    }
}

/// Pick a synthesizer for the given credential.
pub fn create_synthesizer(api_key: Option<&str>, voice: Option<&str>) -> Box<dyn Synthesizer> {
    match api_key.map(str::trim).filter(|key| !key.is_empty()) {
        Some(key) => Box::new(GoogleSynthesizer::new(key, voice)),
        None => Box::new(NullSynthesizer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_synthesizer_reports_disabled() {
        assert!(matches!(
            NullSynthesizer.synthesize("hello"),
            Err(SynthesisError::Disabled)
        ));
    }

    #[test]
    fn factory_falls_back_to_null_without_credential() {
        assert_eq!(create_synthesizer(None, None).name(), "null");
        assert_eq!(create_synthesizer(Some("  "), None).name(), "null");
        assert_eq!(create_synthesizer(Some("key"), None).name(), "google");
    }
}
