use clap::Args;
use formant_core::store::FileStore;
use formant_core::types::{FieldKind, FormField, Template};

use crate::config::{Config, ConfigPaths};

#[derive(Args, Debug, Clone)]
pub struct InitArgs {
    /// Overwrite sample templates that already exist
    #[arg(long)]
    pub force: bool,
}

pub fn run(paths: &ConfigPaths, args: &InitArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_create(paths)?;
    let store = FileStore::new(config.store_dir(paths));

    let mut seeded = 0;
    for template in sample_templates() {
        if store.template_path(&template.id).exists() && !args.force {
            continue;
        }
        store.put_template(&template)?;
        seeded += 1;
    }

    println!("config at {}", paths.config_path.display());
    println!(
        "store at {} ({seeded} sample templates written)",
        config.store_dir(paths).display()
    );
    println!("set DEEPGRAM_API_KEY / OPENROUTER_API_KEY / GOOGLE_TTS_API_KEY to enable voice fill");
    Ok(())
}

fn text_field(id: &str, label: &str, required: bool) -> FormField {
    FormField {
        id: id.to_string(),
        label: label.to_string(),
        kind: FieldKind::Text,
        placeholder: None,
        required,
        options: Vec::new(),
    }
}

fn sample_templates() -> Vec<Template> {
    vec![
        Template {
            id: "contact-request".into(),
            name: "Contact Request".into(),
            category: "general".into(),
            description: "Basic contact form with a free-form message".into(),
            fields: vec![
                text_field("name", "Full Name", true),
                FormField {
                    id: "email".into(),
                    label: "Email".into(),
                    kind: FieldKind::Email,
                    placeholder: Some("you@example.com".into()),
                    required: false,
                    options: Vec::new(),
                },
                FormField {
                    id: "message".into(),
                    label: "Message".into(),
                    kind: FieldKind::MultiLine,
                    placeholder: None,
                    required: true,
                    options: Vec::new(),
                },
            ],
        },
        Template {
            id: "patient-intake".into(),
            name: "Patient Intake".into(),
            category: "health".into(),
            description: "New patient intake questionnaire".into(),
            fields: vec![
                text_field("patient_name", "Patient Name", true),
                FormField {
                    id: "date_of_birth".into(),
                    label: "Date of Birth".into(),
                    kind: FieldKind::Date,
                    placeholder: Some("YYYY-MM-DD".into()),
                    required: true,
                    options: Vec::new(),
                },
                FormField {
                    id: "visit_type".into(),
                    label: "Visit Type".into(),
                    kind: FieldKind::ChoiceSingle,
                    placeholder: None,
                    required: true,
                    options: vec!["new-patient".into(), "follow-up".into()],
                },
                FormField {
                    id: "symptoms".into(),
                    label: "Symptoms".into(),
                    kind: FieldKind::ChoiceMulti,
                    placeholder: None,
                    required: false,
                    options: vec![
                        "fever".into(),
                        "cough".into(),
                        "fatigue".into(),
                        "other".into(),
                    ],
                },
                FormField {
                    id: "reason".into(),
                    label: "Reason for Visit".into(),
                    kind: FieldKind::MultiLine,
                    placeholder: None,
                    required: true,
                    options: Vec::new(),
                },
            ],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use formant_core::store::TemplateStore;

    #[test]
    fn init_seeds_templates_once() {
        let temp = tempfile::tempdir().unwrap();
        let paths = ConfigPaths::from_base(temp.path().join("formant"));
        let args = InitArgs { force: false };
        run(&paths, &args).unwrap();

        let config = Config::load(&paths).unwrap();
        let store = FileStore::new(config.store_dir(&paths));
        let templates = store.list().unwrap();
        assert_eq!(templates.len(), 2);
        assert!(templates.iter().any(|t| t.id == "patient-intake"));

        // Second run leaves the files alone.
        run(&paths, &args).unwrap();
        assert_eq!(store.list().unwrap().len(), 2);
    }

    #[test]
    fn sample_templates_have_required_fields() {
        for template in sample_templates() {
            assert!(template.fields.iter().any(|field| field.required));
        }
    }
}
