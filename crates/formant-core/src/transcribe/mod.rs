pub mod deepgram;

pub use deepgram::DeepgramTranscriber;

use crate::error::{DegradeReason, TranscribeError};

/// Hard cap on encoded clip size, checked before any network call.
pub const MAX_CLIP_BYTES: usize = 10 * 1024 * 1024;

/// Fixed transcript returned when no speech credential is configured.
///
/// Degraded mode, not an error: the conversation continues with this text.
pub const PLACEHOLDER_TRANSCRIPT: &str =
    "(voice note received; transcription is unavailable without a speech service credential)";

/// Fixed transcript returned when the speech service call fails.
pub const FAILURE_TRANSCRIPT: &str =
    "Sorry, I couldn't make out that recording. Please try again, or type it instead.";

/// Encodings the transcription adapter accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Webm,
    Ogg,
    Mp3,
    Flac,
}

impl AudioFormat {
    /// Map a mime type onto a supported format.
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "audio/wav" | "audio/x-wav" | "audio/wave" => Some(AudioFormat::Wav),
            "audio/webm" => Some(AudioFormat::Webm),
            "audio/ogg" => Some(AudioFormat::Ogg),
            "audio/mp3" | "audio/mpeg" => Some(AudioFormat::Mp3),
            "audio/flac" => Some(AudioFormat::Flac),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Webm => "audio/webm",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::Flac => "audio/flac",
        }
    }
}

/// One finalized recording, ready for transcription.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
    pub sample_rate: u32,
}

impl AudioClip {
    /// Build a clip from an encoded payload and its mime tag.
    ///
    /// Rejects unknown mime types up front so no unsupported payload ever
    /// reaches a provider.
    pub fn from_mime(
        bytes: Vec<u8>,
        mime: &str,
        sample_rate: u32,
    ) -> Result<Self, TranscribeError> {
        let format = AudioFormat::from_mime(mime)
            .ok_or_else(|| TranscribeError::UnsupportedFormat(mime.to_string()))?;
        Ok(Self {
            bytes,
            format,
            sample_rate,
        })
    }
}

/// Fail-fast clip validation; runs before any network I/O.
pub fn validate_clip(clip: &AudioClip) -> Result<(), TranscribeError> {
    if clip.bytes.is_empty() {
        return Err(TranscribeError::InvalidAudio);
    }
    if clip.bytes.len() > MAX_CLIP_BYTES {
        return Err(TranscribeError::TooLarge {
            size: clip.bytes.len(),
            limit: MAX_CLIP_BYTES,
        });
    }
    Ok(())
}

/// Transcription result. `degraded` marks fallback content.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub degraded: Option<DegradeReason>,
}

/// Speech-to-text adapter abstraction.
///
/// Validation failures are errors; service failures are not. A provider that
/// cannot reach its service returns a degraded `Transcript` so one flaky call
/// never aborts the conversation.
pub trait Transcriber: Send {
    fn name(&self) -> &'static str;
    fn transcribe(&self, clip: &AudioClip) -> Result<Transcript, TranscribeError>;
}

/// Encode f32 PCM samples as a WAV file (RIFF/WAVE, IEEE float32, mono).
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let num_channels: u16 = 1;
    let bits_per_sample: u16 = 32;
    let block_align = num_channels * (bits_per_sample / 8);
    let byte_rate = sample_rate * u32::from(block_align);
    let data_size = (samples.len() * 4) as u32;
    // IEEE float needs fmt size 18 (format code 3, cbSize=0) plus a fact chunk.
    let fmt_chunk_size: u32 = 18;
    let fact_chunk_size: u32 = 4;
    let file_size = 4 + (8 + fmt_chunk_size) + (8 + fact_chunk_size) + (8 + data_size);

    let mut buf = Vec::with_capacity(12 + file_size as usize);

    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&fmt_chunk_size.to_le_bytes());
    buf.extend_from_slice(&3u16.to_le_bytes()); // IEEE float
    buf.extend_from_slice(&num_channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // cbSize

    // fact sub-chunk (required for non-PCM)
    buf.extend_from_slice(b"fact");
    buf.extend_from_slice(&fact_chunk_size.to_le_bytes());
    buf.extend_from_slice(&(samples.len() as u32).to_le_bytes());

    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for &s in samples {
        buf.extend_from_slice(&s.to_le_bytes());
    }

    buf
}
