use log::{debug, warn};
use serde::Deserialize;
use serde_json::{Value, json};
use ureq::Agent;

use crate::error::DegradeReason;
use crate::http::default_agent;
use crate::speech::Synthesizer;
use crate::types::Role;

use super::reply::{build_system_prompt, field_value_from_json, parse_reply};
use super::{ExtractOutcome, ExtractRequest, Extractor, FAILURE_REPLY, UNCONFIGURED_REPLY};

const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Language-model extraction adapter over the OpenRouter chat API.
///
/// Sends one chat/completions request per utterance and synthesizes the reply
/// through the configured text-to-speech adapter. Every failure mode degrades
/// rather than propagating.
pub struct OpenRouterExtractor {
    agent: Agent,
    model: String,
    base_url: String,
    api_key: Option<String>,
    synthesizer: Box<dyn Synthesizer>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessagePayload,
}

#[derive(Deserialize)]
struct ChatMessagePayload {
    content: String,
}

impl OpenRouterExtractor {
    pub fn new(
        api_key: Option<&str>,
        model: Option<&str>,
        synthesizer: Box<dyn Synthesizer>,
    ) -> Self {
        let api_key = api_key
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        let base_url =
            std::env::var("OPENROUTER_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self {
            agent: default_agent(),
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            base_url,
            api_key,
            synthesizer,
        }
    }

    fn build_messages(request: &ExtractRequest) -> Vec<Value> {
        let mut messages = vec![json!({
            "role": "system",
            "content": build_system_prompt(request.fields, request.form),
        })];
        for message in request.history {
            let role = match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                // Session notices are UI chrome, not conversation.
                Role::Notice => continue,
            };
            messages.push(json!({ "role": role, "content": message.text }));
        }
        messages.push(json!({ "role": "user", "content": request.utterance }));
        messages
    }

    fn request_chat(&self, api_key: &str, request: &ExtractRequest) -> Result<String, String> {
        let body = json!({
            "model": self.model,
            "messages": Self::build_messages(request),
            "temperature": 0.2,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .agent
            .post(&url)
            .header("Authorization", &format!("Bearer {api_key}"))
            .send_json(body)
            .map_err(|e| format!("{e}"))?;

        let raw = response
            .into_body()
            .read_to_string()
            .map_err(|e| format!("{e}"))?;
        Self::parse_response(raw.trim())
    }

    fn parse_response(body: &str) -> Result<String, String> {
        let response: ChatResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;
        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| "no choices in response".to_string())?;
        Ok(choice.message.content)
    }

    /// Turn raw model content into an outcome.
    ///
    /// Content that does not follow the structured shape becomes the reply
    /// verbatim with an empty extraction; the turn is never failed over it.
    fn outcome_from_content(content: String) -> ExtractOutcome {
        match parse_reply(content.trim()) {
            Some(payload) => {
                let values = payload
                    .extracted_data
                    .iter()
                    .filter_map(|(key, value)| {
                        field_value_from_json(value).map(|v| (key.clone(), v))
                    })
                    .collect();
                let reply = if payload.response.trim().is_empty() {
                    content.trim().to_string()
                } else {
                    payload.response
                };
                ExtractOutcome {
                    reply,
                    values,
                    audio: None,
                    degraded: None,
                }
            }
            None => ExtractOutcome {
                reply: content.trim().to_string(),
                values: Vec::new(),
                audio: None,
                degraded: Some(DegradeReason::MalformedReply),
            },
        }
    }

    fn attach_audio(&self, outcome: &mut ExtractOutcome) {
        if outcome.reply.is_empty() {
            return;
        }
        match self.synthesizer.synthesize(&outcome.reply) {
            Ok(audio) => outcome.audio = Some(audio),
            Err(err) => debug!("speech synthesis skipped: {err}"),
        }
    }
}

impl Extractor for OpenRouterExtractor {
    fn name(&self) -> &'static str {
        "openrouter"
    }

    fn extract(&self, request: &ExtractRequest) -> ExtractOutcome {
        let Some(api_key) = self.api_key.as_deref() else {
            return ExtractOutcome::degraded(UNCONFIGURED_REPLY, DegradeReason::MissingCredential);
        };

        let mut outcome = match self.request_chat(api_key, request) {
            Ok(content) => Self::outcome_from_content(content),
            Err(err) => {
                warn!("extraction request failed: {err}");
                ExtractOutcome::degraded(FAILURE_REPLY, DegradeReason::ServiceFailed)
            }
        };

        self.attach_audio(&mut outcome);
        outcome
    }
}
