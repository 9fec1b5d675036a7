use log::{debug, warn};

use crate::error::SessionError;
use crate::extract::{ExtractOutcome, ExtractRequest, Extractor};
use crate::fields::resolve_field;
use crate::store::{ActivityEntry, ActivityLog, FormSubmission, SubmissionSink};
use crate::transcribe::{AudioClip, Transcriber};
use crate::types::{ChatMessage, FieldValue, FormData, SessionPhase, Template};

/// User input for one conversation turn.
pub enum Utterance {
    Text(String),
    Audio(AudioClip),
}

/// The autofill conversation orchestrator.
///
/// Holds exactly one template, one form state, one chat log, and one phase.
/// Phase moves forward only, except reviewing -> conversing; submitted is
/// terminal. At most one utterance is in flight at a time; a second
/// `begin_turn` while pending is rejected with `Busy` so chat append order
/// always matches submission order.
pub struct Session {
    phase: SessionPhase,
    template: Option<Template>,
    form: FormData,
    chat: Vec<ChatMessage>,
    pending: bool,
}

impl Session {
    pub fn new() -> Self {
        Self {
            phase: SessionPhase::SelectingTemplate,
            template: None,
            form: FormData::new(),
            chat: Vec::new(),
            pending: false,
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn template(&self) -> Option<&Template> {
        self.template.as_ref()
    }

    pub fn form(&self) -> &FormData {
        &self.form
    }

    pub fn chat(&self) -> &[ChatMessage] {
        &self.chat
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Load a template and open the conversation.
    pub fn select_template(&mut self, template: Template) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::SelectingTemplate)?;
        self.form.clear();
        self.chat = vec![ChatMessage::notice(format!(
            "Let's fill out \"{}\". Tell me the details and I'll fill the fields as we go.",
            template.name
        ))];
        self.template = Some(template);
        self.phase = SessionPhase::Conversing;
        Ok(())
    }

    /// Record the user's utterance and mark a turn in flight.
    ///
    /// The user message is appended before any adapter work so it shows up
    /// immediately, whatever the network does afterwards.
    pub fn begin_turn(&mut self, text: &str, audio: Option<Vec<u8>>) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Conversing)?;
        if self.pending {
            return Err(SessionError::Busy);
        }
        self.chat.push(ChatMessage::user(text, audio));
        self.pending = true;
        Ok(())
    }

    /// Apply an extraction outcome: append the assistant message and merge
    /// the extracted values into the form.
    pub fn complete_turn(&mut self, outcome: ExtractOutcome) -> Result<(), SessionError> {
        if !self.pending {
            return Err(SessionError::NoPendingTurn);
        }
        self.merge_extraction(outcome.values);
        self.chat
            .push(ChatMessage::assistant(outcome.reply, outcome.audio));
        self.pending = false;
        Ok(())
    }

    /// Drop an in-flight turn without an assistant message.
    pub fn abandon_turn(&mut self) {
        self.pending = false;
    }

    /// Run one full conversation turn: transcribe audio input if needed,
    /// extract, and merge. Clip validation errors propagate; service
    /// failures arrive as degraded outcomes and complete the turn normally.
    pub fn converse(
        &mut self,
        input: Utterance,
        transcriber: &dyn Transcriber,
        extractor: &dyn Extractor,
    ) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Conversing)?;
        let (text, audio) = match input {
            Utterance::Text(text) => (text, None),
            Utterance::Audio(clip) => {
                let transcript = transcriber.transcribe(&clip)?;
                (transcript.text, Some(clip.bytes))
            }
        };
        self.begin_turn(&text, audio)?;

        let outcome = {
            let Some(template) = self.template.as_ref() else {
                return Err(SessionError::InvalidPhase {
                    expected: SessionPhase::Conversing.name(),
                    actual: SessionPhase::SelectingTemplate.name(),
                });
            };
            // History excludes the user message begin_turn just appended.
            let history_end = self.chat.len().saturating_sub(1);
            let request = ExtractRequest {
                utterance: &text,
                fields: &template.fields,
                form: &self.form,
                history: &self.chat[..history_end],
            };
            extractor.extract(&request)
        };
        self.complete_turn(outcome)
    }

    pub fn request_review(&mut self) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Conversing)?;
        if self.pending {
            return Err(SessionError::Busy);
        }
        self.phase = SessionPhase::Reviewing;
        Ok(())
    }

    pub fn resume_editing(&mut self) -> Result<(), SessionError> {
        self.expect_phase(SessionPhase::Reviewing)?;
        self.phase = SessionPhase::Conversing;
        Ok(())
    }

    /// Direct user edit of a single field.
    pub fn set_field(&mut self, id: &str, value: FieldValue) -> Result<(), SessionError> {
        self.expect_editable()?;
        let known = self
            .template
            .as_ref()
            .is_some_and(|template| template.fields.iter().any(|field| field.id == id));
        if !known {
            return Err(SessionError::UnknownField(id.to_string()));
        }
        self.form.insert(id.to_string(), value);
        Ok(())
    }

    /// Empty a field. Clearing a known field that holds no value is a no-op.
    pub fn clear_field(&mut self, id: &str) -> Result<(), SessionError> {
        self.expect_editable()?;
        let known = self
            .template
            .as_ref()
            .is_some_and(|template| template.fields.iter().any(|field| field.id == id));
        if !known {
            return Err(SessionError::UnknownField(id.to_string()));
        }
        self.form.remove(id);
        Ok(())
    }

    /// Ids of required fields whose value is empty or whitespace-only.
    pub fn missing_required_fields(&self) -> Vec<String> {
        let Some(template) = self.template.as_ref() else {
            return Vec::new();
        };
        template
            .fields
            .iter()
            .filter(|field| field.required)
            .filter(|field| {
                self.form
                    .get(&field.id)
                    .is_none_or(|value| value.is_blank())
            })
            .map(|field| field.id.clone())
            .collect()
    }

    /// Finalize the session: hand the form to the submission sink and log an
    /// activity entry. Blocked (not failed destructively) while required
    /// fields are unfilled; the session lands on the review step instead.
    pub fn submit(
        &mut self,
        sink: &dyn SubmissionSink,
        activity: &dyn ActivityLog,
    ) -> Result<FormSubmission, SessionError> {
        match self.phase {
            SessionPhase::Conversing | SessionPhase::Reviewing => {}
            other => {
                return Err(SessionError::InvalidPhase {
                    expected: SessionPhase::Reviewing.name(),
                    actual: other.name(),
                });
            }
        }
        if self.pending {
            return Err(SessionError::Busy);
        }

        let missing = self.missing_required_fields();
        if !missing.is_empty() {
            self.phase = SessionPhase::Reviewing;
            return Err(SessionError::MissingFields(missing));
        }

        let Some(template) = self.template.as_ref() else {
            return Err(SessionError::InvalidPhase {
                expected: SessionPhase::Reviewing.name(),
                actual: SessionPhase::SelectingTemplate.name(),
            });
        };
        let submission = FormSubmission::new(&template.id, self.form.clone());
        sink.submit(&submission)?;
        if let Err(err) = activity.record(&ActivityEntry::submission(&submission)) {
            warn!("activity log write failed: {err}");
        }
        self.phase = SessionPhase::Submitted;
        Ok(submission)
    }

    /// Whole-session reset: back to template selection, everything cleared.
    pub fn reset(&mut self) {
        *self = Session::new();
    }

    fn merge_extraction(&mut self, values: Vec<(String, FieldValue)>) {
        let Some(template) = self.template.as_ref() else {
            return;
        };
        for (raw_key, value) in values {
            match resolve_field(&template.fields, &raw_key) {
                Some(field) => {
                    self.form.insert(field.id.clone(), value);
                }
                None => debug!("discarding extracted key with no matching field: {raw_key}"),
            }
        }
    }

    fn expect_phase(&self, expected: SessionPhase) -> Result<(), SessionError> {
        if self.phase != expected {
            return Err(SessionError::InvalidPhase {
                expected: expected.name(),
                actual: self.phase.name(),
            });
        }
        Ok(())
    }

    fn expect_editable(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Conversing | SessionPhase::Reviewing => Ok(()),
            other => Err(SessionError::InvalidPhase {
                expected: SessionPhase::Conversing.name(),
                actual: other.name(),
            }),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DegradeReason, TranscribeError};
    use crate::store::MemoryStore;
    use crate::transcribe::{AudioFormat, Transcript, validate_clip};
    use crate::types::{FieldKind, FormField, Role};

    struct FakeExtractor {
        values: Vec<(String, FieldValue)>,
    }

    impl FakeExtractor {
        fn returning(values: Vec<(&str, &str)>) -> Self {
            Self {
                values: values
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), FieldValue::Scalar(v.to_string())))
                    .collect(),
            }
        }
    }

    impl Extractor for FakeExtractor {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn extract(&self, _request: &ExtractRequest) -> ExtractOutcome {
            ExtractOutcome {
                reply: "Got it.".into(),
                values: self.values.clone(),
                audio: None,
                degraded: None,
            }
        }
    }

    struct FakeTranscriber;

    impl Transcriber for FakeTranscriber {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn transcribe(&self, clip: &AudioClip) -> Result<Transcript, TranscribeError> {
            validate_clip(clip)?;
            Ok(Transcript {
                text: "my name is Alex".into(),
                degraded: None,
            })
        }
    }

    fn field(id: &str, label: &str, required: bool) -> FormField {
        FormField {
            id: id.to_string(),
            label: label.to_string(),
            kind: FieldKind::Text,
            placeholder: None,
            required,
            options: Vec::new(),
        }
    }

    fn template() -> Template {
        Template {
            id: "contact".into(),
            name: "Contact".into(),
            category: "demo".into(),
            description: String::new(),
            fields: vec![field("name", "Full Name", true), field("email", "Email", false)],
        }
    }

    fn conversing_session() -> Session {
        let mut session = Session::new();
        session.select_template(template()).unwrap();
        session
    }

    #[test]
    fn select_template_opens_conversation_with_welcome() {
        let session = conversing_session();
        assert_eq!(session.phase(), SessionPhase::Conversing);
        assert!(session.form().is_empty());
        assert_eq!(session.chat().len(), 1);
        assert_eq!(session.chat()[0].role, Role::Notice);
    }

    #[test]
    fn select_template_twice_is_invalid() {
        let mut session = conversing_session();
        assert!(matches!(
            session.select_template(template()),
            Err(SessionError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn text_turn_appends_messages_and_merges_values() {
        let mut session = conversing_session();
        let extractor = FakeExtractor::returning(vec![("name", "Alex")]);
        session
            .converse(
                Utterance::Text("I'm Alex".into()),
                &FakeTranscriber,
                &extractor,
            )
            .unwrap();

        assert_eq!(session.chat().len(), 3); // notice + user + assistant
        assert_eq!(session.chat()[1].role, Role::User);
        assert_eq!(session.chat()[2].role, Role::Assistant);
        assert_eq!(
            session.form().get("name"),
            Some(&FieldValue::Scalar("Alex".into()))
        );
        assert!(!session.is_pending());
    }

    #[test]
    fn extraction_keys_match_through_normalizer() {
        let mut session = conversing_session();
        session.begin_turn("hello", None).unwrap();
        session
            .complete_turn(ExtractOutcome {
                reply: "ok".into(),
                values: vec![("Full Name".into(), FieldValue::Scalar("Jane".into()))],
                audio: None,
                degraded: None,
            })
            .unwrap();
        assert_eq!(
            session.form().get("name"),
            Some(&FieldValue::Scalar("Jane".into()))
        );
    }

    #[test]
    fn unmatched_extraction_keys_are_discarded() {
        let mut session = conversing_session();
        session.set_field("email", "a@b.c".into()).unwrap();
        session.begin_turn("hello", None).unwrap();
        session
            .complete_turn(ExtractOutcome {
                reply: "ok".into(),
                values: vec![("shoe size".into(), FieldValue::Scalar("42".into()))],
                audio: None,
                degraded: None,
            })
            .unwrap();
        // No new key, and the unrelated key is untouched.
        assert_eq!(session.form().len(), 1);
        assert_eq!(
            session.form().get("email"),
            Some(&FieldValue::Scalar("a@b.c".into()))
        );
    }

    #[test]
    fn second_turn_while_pending_is_busy() {
        let mut session = conversing_session();
        session.begin_turn("first", None).unwrap();
        assert!(matches!(
            session.begin_turn("second", None),
            Err(SessionError::Busy)
        ));
        assert!(matches!(
            session.request_review(),
            Err(SessionError::Busy)
        ));
        session.abandon_turn();
        session.begin_turn("second", None).unwrap();
    }

    #[test]
    fn complete_without_begin_is_rejected() {
        let mut session = conversing_session();
        let outcome = ExtractOutcome {
            reply: "ok".into(),
            values: Vec::new(),
            audio: None,
            degraded: None,
        };
        assert!(matches!(
            session.complete_turn(outcome),
            Err(SessionError::NoPendingTurn)
        ));
    }

    #[test]
    fn audio_turn_transcribes_then_extracts() {
        let mut session = conversing_session();
        let clip = AudioClip {
            bytes: vec![1u8; 128],
            format: AudioFormat::Wav,
            sample_rate: 16_000,
        };
        let extractor = FakeExtractor::returning(vec![("name", "Alex")]);
        session
            .converse(Utterance::Audio(clip), &FakeTranscriber, &extractor)
            .unwrap();
        assert_eq!(session.chat()[1].text, "my name is Alex");
        assert!(session.chat()[1].audio.is_some());
    }

    #[test]
    fn invalid_audio_propagates_and_leaves_chat_untouched() {
        let mut session = conversing_session();
        let empty = AudioClip {
            bytes: Vec::new(),
            format: AudioFormat::Wav,
            sample_rate: 16_000,
        };
        let extractor = FakeExtractor::returning(Vec::new());
        let result = session.converse(Utterance::Audio(empty), &FakeTranscriber, &extractor);
        assert!(matches!(
            result,
            Err(SessionError::Audio(TranscribeError::InvalidAudio))
        ));
        assert_eq!(session.chat().len(), 1);
        assert!(!session.is_pending());
    }

    #[test]
    fn degraded_outcome_still_completes_the_turn() {
        let mut session = conversing_session();
        session.begin_turn("hello", None).unwrap();
        session
            .complete_turn(ExtractOutcome::degraded(
                "sorry, try again",
                DegradeReason::ServiceFailed,
            ))
            .unwrap();
        assert_eq!(session.chat().len(), 3);
        assert!(session.form().is_empty());
    }

    #[test]
    fn review_and_resume_round_trip() {
        let mut session = conversing_session();
        session.request_review().unwrap();
        assert_eq!(session.phase(), SessionPhase::Reviewing);
        session.resume_editing().unwrap();
        assert_eq!(session.phase(), SessionPhase::Conversing);
    }

    #[test]
    fn submit_blocks_on_missing_required_fields() {
        let mut session = conversing_session();
        let store = MemoryStore::new(Vec::new());
        let result = session.submit(&store, &store);
        assert!(
            matches!(result, Err(SessionError::MissingFields(ref missing)) if missing == &vec!["name".to_string()])
        );
        // Returned to the review step, nothing submitted.
        assert_eq!(session.phase(), SessionPhase::Reviewing);
        assert!(store.submissions().is_empty());
    }

    #[test]
    fn whitespace_only_value_counts_as_unfilled() {
        let mut session = conversing_session();
        session.set_field("name", "   ".into()).unwrap();
        assert_eq!(session.missing_required_fields(), vec!["name".to_string()]);
    }

    #[test]
    fn submit_succeeds_with_optional_field_empty() {
        let mut session = conversing_session();
        let store = MemoryStore::new(Vec::new());
        session.set_field("name", "Alex".into()).unwrap();

        let submission = session.submit(&store, &store).unwrap();
        assert_eq!(session.phase(), SessionPhase::Submitted);
        assert_eq!(submission.template_id, "contact");
        assert_eq!(store.submissions().len(), 1);
        assert_eq!(store.activity().len(), 1);

        // Submitted is terminal.
        assert!(matches!(
            session.submit(&store, &store),
            Err(SessionError::InvalidPhase { .. })
        ));
    }

    #[test]
    fn empty_extraction_then_direct_edit_unblocks_submit() {
        let mut session = conversing_session();
        let store = MemoryStore::new(Vec::new());
        let extractor = FakeExtractor::returning(Vec::new());
        session
            .converse(
                Utterance::Text("hello".into()),
                &FakeTranscriber,
                &extractor,
            )
            .unwrap();

        assert!(session.submit(&store, &store).is_err());
        session.resume_editing().unwrap();
        session.set_field("name", "Alex".into()).unwrap();
        session.submit(&store, &store).unwrap();
        assert_eq!(session.phase(), SessionPhase::Submitted);
    }

    #[test]
    fn set_field_rejects_unknown_ids() {
        let mut session = conversing_session();
        assert!(matches!(
            session.set_field("nope", "x".into()),
            Err(SessionError::UnknownField(_))
        ));
    }

    #[test]
    fn clear_field_removes_a_value() {
        let mut session = conversing_session();
        session.set_field("name", "Alex".into()).unwrap();
        session.clear_field("name").unwrap();
        assert!(session.form().is_empty());
    }

    #[test]
    fn clear_unset_known_field_is_a_no_op() {
        let mut session = conversing_session();
        session.clear_field("email").unwrap();
        assert!(matches!(
            session.clear_field("bogus"),
            Err(SessionError::UnknownField(_))
        ));
    }

    #[test]
    fn chat_log_only_grows_until_reset() {
        let mut session = conversing_session();
        let extractor = FakeExtractor::returning(Vec::new());
        let mut last_len = session.chat().len();
        for i in 0..3 {
            session
                .converse(
                    Utterance::Text(format!("turn {i}")),
                    &FakeTranscriber,
                    &extractor,
                )
                .unwrap();
            assert!(session.chat().len() > last_len);
            last_len = session.chat().len();
        }

        session.reset();
        assert_eq!(session.phase(), SessionPhase::SelectingTemplate);
        assert!(session.chat().is_empty());
        assert!(session.form().is_empty());
    }
}
