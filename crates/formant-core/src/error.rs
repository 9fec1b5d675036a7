use thiserror::Error;

/// Errors from the microphone capture controller.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("microphone unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("no input device found")]
    NoDevice,

    #[error("capture configuration failed: {0}")]
    ConfigFailed(String),

    #[error("capture start failed: {0}")]
    StartFailed(String),

    #[error("capture backend error: {0}")]
    Backend(String),
}

/// Validation errors raised before any transcription network call.
#[derive(Debug, Error)]
pub enum TranscribeError {
    #[error("audio payload is empty")]
    InvalidAudio,

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("audio payload of {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Errors from speech synthesis providers.
#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("speech synthesis disabled")]
    Disabled,

    #[error("network error: {0}")]
    Network(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Why an AI adapter returned degraded content instead of failing.
///
/// Adapters swallow service failures and hand back usable text; this tag lets
/// callers tell real model output from fallback content without inspecting
/// the strings themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DegradeReason {
    MissingCredential,
    ServiceFailed,
    MalformedReply,
}

/// Errors from the autofill session state machine.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("operation not valid in phase {actual} (expected {expected})")]
    InvalidPhase {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("an utterance is already in flight")]
    Busy,

    #[error("no utterance in flight")]
    NoPendingTurn,

    #[error("unknown field: {0}")]
    UnknownField(String),

    #[error("required fields are unfilled: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("audio error: {0}")]
    Audio(#[from] TranscribeError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from template/submission/activity repositories.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("store serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("store encode error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("template not found: {0}")]
    NotFound(String),
}
