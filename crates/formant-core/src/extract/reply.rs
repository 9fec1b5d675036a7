use serde::Deserialize;
use serde_json::Value;

use crate::types::{FieldValue, FormData, FormField};

pub(crate) fn build_system_prompt(fields: &[FormField], form: &FormData) -> String {
    let schema = fields
        .iter()
        .map(|field| {
            let mut line = format!("- {} ({})", field.id, field.label);
            if field.required {
                line.push_str(" [required]");
            }
            if !field.options.is_empty() {
                line.push_str(&format!(" options: {}", field.options.join(" | ")));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n");

    let current = if form.is_empty() {
        "(all fields are empty)".to_string()
    } else {
        form.iter()
            .map(|(id, value)| format!("- {id}: {}", value.as_text()))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "You help a user fill out a form by conversation. Return ONLY valid JSON with this schema:\n{{\n  \"response\": \"one short sentence back to the user\",\n  \"extractedData\": {{\"field_id\": \"value\"}}\n}}\n\nRules:\n- extractedData keys must come from the field list below; omit fields the user did not mention\n- never invent values; only extract what the user actually said\n- multi-choice fields take an array of strings\n- ask about at most one unfilled required field in the response\n- keep the response conversational and under 40 words\n\nFields:\n{schema}\n\nCurrent values:\n{current}\n"
    )
}

#[derive(Deserialize)]
pub(crate) struct ReplyPayload {
    #[serde(default)]
    pub response: String,
    #[serde(default, rename = "extractedData")]
    pub extracted_data: serde_json::Map<String, Value>,
}

/// Parse the model's content as the structured reply shape.
///
/// Tries the raw content first, then a brace-bounded substring for models
/// that wrap JSON in prose or code fences. `None` means the content is not
/// structured at all and should be treated as a plain reply.
pub(crate) fn parse_reply(content: &str) -> Option<ReplyPayload> {
    if let Ok(payload) = serde_json::from_str::<ReplyPayload>(content) {
        return Some(payload);
    }
    let json = extract_json_object(content)?;
    serde_json::from_str(json).ok()
}

fn extract_json_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(&input[start..=end])
}

/// Convert an extracted JSON value into a form value.
///
/// Objects and nulls carry nothing usable and are dropped.
pub(crate) fn field_value_from_json(value: &Value) -> Option<FieldValue> {
    match value {
        Value::String(text) => Some(FieldValue::Scalar(text.clone())),
        Value::Number(number) => Some(FieldValue::Scalar(number.to_string())),
        Value::Bool(flag) => Some(FieldValue::Scalar(flag.to_string())),
        Value::Array(items) => {
            let texts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(text) => Some(text.clone()),
                    Value::Number(number) => Some(number.to_string()),
                    _ => None,
                })
                .collect();
            Some(FieldValue::List(texts))
        }
        Value::Null | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldKind;

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

    #[test]
    fn prompt_lists_fields_and_marks_required() {
        let fields = vec![field("name", "Full Name", true), field("email", "Email", false)];
        let prompt = build_system_prompt(&fields, &FormData::new());
        assert!(prompt.contains("- name (Full Name) [required]"));
        assert!(prompt.contains("- email (Email)"));
        assert!(prompt.contains("extractedData"));
        assert!(prompt.contains("(all fields are empty)"));
    }

    #[test]
    fn prompt_includes_current_values() {
        let fields = vec![field("name", "Full Name", true)];
        let mut form = FormData::new();
        form.insert("name".into(), "Alex".into());
        let prompt = build_system_prompt(&fields, &form);
        assert!(prompt.contains("- name: Alex"));
    }

    #[test]
    fn parse_reply_accepts_clean_json() {
        let payload =
            parse_reply(r#"{"response":"Got it.","extractedData":{"name":"Jane"}}"#).unwrap();
        assert_eq!(payload.response, "Got it.");
        assert_eq!(payload.extracted_data.len(), 1);
    }

    #[test]
    fn parse_reply_recovers_wrapped_json() {
        let content = "Sure!\n```json\n{\"response\":\"Done\",\"extractedData\":{}}\n```";
        let payload = parse_reply(content).unwrap();
        assert_eq!(payload.response, "Done");
    }

    #[test]
    fn parse_reply_rejects_plain_prose() {
        assert!(parse_reply("I could not find any fields, sorry.").is_none());
    }

    #[test]
    fn missing_keys_default_in_payload() {
        let payload = parse_reply(r#"{"response":"hi"}"#).unwrap();
        assert!(payload.extracted_data.is_empty());
    }

    #[test]
    fn json_values_convert_to_field_values() {
        use serde_json::json;
        assert_eq!(
            field_value_from_json(&json!("Jane")),
            Some(FieldValue::Scalar("Jane".into()))
        );
        assert_eq!(
            field_value_from_json(&json!(42)),
            Some(FieldValue::Scalar("42".into()))
        );
        assert_eq!(
            field_value_from_json(&json!(["a", "b"])),
            Some(FieldValue::List(vec!["a".into(), "b".into()]))
        );
        assert_eq!(field_value_from_json(&json!(null)), None);
        assert_eq!(field_value_from_json(&json!({"nested": 1})), None);
    }
}
