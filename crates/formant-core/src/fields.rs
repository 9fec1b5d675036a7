//! Key normalization for reconciling extracted keys with form fields.
//!
//! A language model may hand back `"Patient Name"` for a field whose id is
//! `patient_name`. Matching is case- and punctuation-insensitive but never
//! fuzzy: normalized forms must compare equal.

use crate::types::FormField;

/// Strip every non-alphanumeric character and lowercase the rest.
///
/// Idempotent: `normalize(normalize(s)) == normalize(s)`.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Whether a raw extracted key denotes this field.
///
/// The id is tried before the label.
pub fn field_matches(field: &FormField, raw_key: &str) -> bool {
    let key = normalize(raw_key);
    key == normalize(&field.id) || key == normalize(&field.label)
}

/// Resolve a raw key against a field schema.
///
/// First match wins, in field declaration order; two fields normalizing
/// identically is an authoring defect, not handled here.
pub fn resolve_field<'a>(fields: &'a [FormField], raw_key: &str) -> Option<&'a FormField> {
    fields.iter().find(|field| field_matches(field, raw_key))
}
