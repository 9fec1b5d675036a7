use std::io::{self, BufRead, Write};

use formant_core::capture::{CaptureConfig, CpalBackend, Recorder};
use formant_core::error::SessionError;
use formant_core::extract::OpenRouterExtractor;
use formant_core::session::{Session, Utterance};
use formant_core::speech::create_synthesizer;
use formant_core::store::{FileStore, TemplateStore};
use formant_core::transcribe::DeepgramTranscriber;
use formant_core::types::{FieldValue, RecordingState, Role, Template};

use crate::config::{Config, ConfigPaths};

const HELP: &str = "\
commands:
  :record        start a microphone take
  :stop          finish the take and send it
  :discard       throw the current take away
  :review        show the form and switch to review
  :back          return from review to the conversation
  :form          show current field values
  :set ID VALUE  fill a field directly
  :clear ID      empty a field
  :submit        submit the form
  :help          this text
  :quit          leave without submitting
anything else is sent to the assistant as an utterance";

pub fn run(
    config: &Config,
    paths: &ConfigPaths,
    template_id: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = FileStore::new(config.store_dir(paths));
    let transcriber = DeepgramTranscriber::new(
        config.transcribe_key().as_deref(),
        Some(&config.transcribe.model),
    )
    .with_language(&config.transcribe.language, config.transcribe.punctuate);
    let synthesizer = create_synthesizer(config.speech_key().as_deref(), Some(&config.speech.voice));
    let extractor = OpenRouterExtractor::new(
        config.extract_key().as_deref(),
        Some(&config.extract.model),
        synthesizer,
    );

    let template = pick_template(&store, template_id)?;
    let mut session = Session::new();
    session.select_template(template)?;

    let capture_config = CaptureConfig {
        device_id: (!config.audio.device.trim().is_empty())
            .then(|| config.audio.device.trim().to_string()),
        noise_suppression: config.audio.noise_suppression,
        echo_cancellation: config.audio.echo_cancellation,
    };
    let mut recorder = Recorder::new(Box::new(CpalBackend::new()), capture_config);

    let mut printed = 0;
    printed = print_chat_tail(&session, printed);
    println!("(:help for commands)");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();

        match line {
            "" => continue,
            ":help" => println!("{HELP}"),
            ":quit" => break,
            ":record" => match recorder.start() {
                Ok(()) => println!("recording... (:stop to send, :discard to throw away)"),
                Err(err) => println!("cannot record: {err}"),
            },
            ":stop" => {
                if recorder.state() != RecordingState::Recording {
                    println!("not recording");
                    continue;
                }
                if let Err(err) = recorder.stop() {
                    println!("recording failed: {err}");
                    continue;
                }
                match recorder.take_clip() {
                    Some(clip) => {
                        let result =
                            session.converse(Utterance::Audio(clip), &transcriber, &extractor);
                        printed = report(&session, printed, result);
                    }
                    None => println!("nothing recorded"),
                }
            }
            ":discard" => {
                recorder.reset();
                println!("take discarded");
            }
            ":review" => match session.request_review() {
                Ok(()) => print_form(&session),
                Err(err) => println!("{err}"),
            },
            ":back" => match session.resume_editing() {
                Ok(()) => println!("back to the conversation"),
                Err(err) => println!("{err}"),
            },
            ":form" => print_form(&session),
            ":submit" => match session.submit(&store, &store) {
                Ok(submission) => {
                    println!("submitted as {}", submission.id);
                    return Ok(());
                }
                Err(SessionError::MissingFields(missing)) => {
                    println!("still needed: {}", missing.join(", "));
                    print_form(&session);
                }
                Err(err) => println!("{err}"),
            },
            _ if line.starts_with(":set ") => {
                let rest = line.trim_start_matches(":set ").trim();
                match rest.split_once(char::is_whitespace) {
                    Some((id, value)) => {
                        let result =
                            session.set_field(id, FieldValue::Scalar(value.trim().to_string()));
                        if let Err(err) = result {
                            println!("{err}");
                        }
                    }
                    None => println!("usage: :set ID VALUE"),
                }
            }
            _ if line.starts_with(":clear ") => {
                let id = line.trim_start_matches(":clear ").trim();
                if let Err(err) = session.clear_field(id) {
                    println!("{err}");
                }
            }
            _ if line.starts_with(':') => println!("unknown command (:help)"),
            utterance => {
                let result = session.converse(
                    Utterance::Text(utterance.to_string()),
                    &transcriber,
                    &extractor,
                );
                printed = report(&session, printed, result);
            }
        }
    }
    Ok(())
}

fn pick_template(
    store: &FileStore,
    template_id: Option<&str>,
) -> Result<Template, Box<dyn std::error::Error>> {
    if let Some(id) = template_id {
        return Ok(store.get(id)?);
    }

    let templates = store.list()?;
    if templates.is_empty() {
        return Err("no templates found; run `formant init` first".into());
    }

    println!("templates:");
    for (index, template) in templates.iter().enumerate() {
        println!(
            "  {}. {} [{}] - {}",
            index + 1,
            template.name,
            template.category,
            template.description
        );
    }

    let stdin = io::stdin();
    loop {
        print!("pick a template (1-{}): ", templates.len());
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err("no template selected".into());
        }
        if let Ok(index) = line.trim().parse::<usize>()
            && (1..=templates.len()).contains(&index)
        {
            return Ok(templates[index - 1].clone());
        }
        println!("not a valid choice");
    }
}

fn report(session: &Session, printed: usize, result: Result<(), SessionError>) -> usize {
    if let Err(err) = result {
        println!("{err}");
    }
    print_chat_tail(session, printed)
}

fn print_chat_tail(session: &Session, printed: usize) -> usize {
    for message in &session.chat()[printed..] {
        let prefix = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
            Role::Notice => "*",
        };
        match &message.audio {
            Some(audio) => println!("{prefix}> {} [audio {} bytes]", message.text, audio.len()),
            None => println!("{prefix}> {}", message.text),
        }
    }
    session.chat().len()
}

fn print_form(session: &Session) {
    let Some(template) = session.template() else {
        return;
    };
    let missing = session.missing_required_fields();
    println!("{} ({})", template.name, session.phase().name());
    for field in &template.fields {
        let value = session
            .form()
            .get(&field.id)
            .map(FieldValue::as_text)
            .unwrap_or_default();
        let marker = if missing.contains(&field.id) {
            " (required, unfilled)"
        } else {
            ""
        };
        println!("  {}: {value}{marker}", field.id);
    }
}
