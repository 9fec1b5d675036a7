pub mod openrouter;
mod reply;

pub use openrouter::OpenRouterExtractor;

use crate::error::DegradeReason;
use crate::types::{ChatMessage, FieldValue, FormData, FormField};

/// Fixed reply when the language model cannot be reached.
pub const FAILURE_REPLY: &str =
    "Sorry, I'm having trouble reaching the assistant right now. Your form is unchanged; please try again in a moment.";

/// Fixed reply when no language-model credential is configured.
pub const UNCONFIGURED_REPLY: &str =
    "The assistant is not configured yet; add a language model credential to enable voice fill. You can still edit fields directly.";

/// One extraction turn: the latest utterance plus everything the model needs
/// to ground its answer.
///
/// `history` holds prior turns only; the utterance being processed is passed
/// separately and must not appear in it.
pub struct ExtractRequest<'a> {
    pub utterance: &'a str,
    pub fields: &'a [FormField],
    pub form: &'a FormData,
    pub history: &'a [ChatMessage],
}

/// What an extraction turn produced.
///
/// `values` carries raw model keys; the session resolves them against the
/// field schema. `degraded` is set when any fallback content was substituted.
pub struct ExtractOutcome {
    pub reply: String,
    pub values: Vec<(String, FieldValue)>,
    pub audio: Option<Vec<u8>>,
    pub degraded: Option<DegradeReason>,
}

impl ExtractOutcome {
    pub(crate) fn degraded(reply: &str, reason: DegradeReason) -> Self {
        Self {
            reply: reply.to_string(),
            values: Vec::new(),
            audio: None,
            degraded: Some(reason),
        }
    }
}

/// Language-model extraction adapter.
///
/// Infallible by contract: transport and parse failures degrade to an
/// apologetic reply with an empty extraction, never an error.
pub trait Extractor: Send {
    fn name(&self) -> &'static str;
    fn extract(&self, request: &ExtractRequest) -> ExtractOutcome;
}
