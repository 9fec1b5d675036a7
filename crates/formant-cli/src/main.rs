mod chat;
mod config;
mod init;

use clap::{Parser, Subcommand};
use config::{Config, ConfigPaths};
use formant_core::capture::list_input_devices;
use formant_core::store::{FileStore, TemplateStore};

#[derive(Parser)]
#[command(name = "formant", version, about = "voice-driven form autofill engine")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    run: RunArgs,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config and seed sample templates
    Init(init::InitArgs),
    /// List available form templates
    Templates,
    /// Print the active config with credentials redacted
    Config,
    /// List microphone input devices
    Devices,
}

#[derive(Parser, Debug, Clone)]
struct RunArgs {
    /// Template id to fill, skipping interactive selection
    #[arg(long, value_name = "id")]
    template: Option<String>,

    /// Input device name override
    #[arg(long, value_name = "name")]
    device: Option<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let paths = ConfigPaths::from_home()?;

    match cli.command {
        Some(Command::Init(args)) => init::run(&paths, &args),
        Some(Command::Templates) => {
            let config = Config::load_or_create(&paths)?;
            let store = FileStore::new(config.store_dir(&paths));
            for template in store.list()? {
                println!(
                    "{} [{}] {} ({} fields)",
                    template.id,
                    template.category,
                    template.name,
                    template.fields.len()
                );
            }
            Ok(())
        }
        Some(Command::Config) => {
            let config = Config::load_or_create(&paths)?;
            print!("{}", toml::to_string_pretty(&config.redacted())?);
            Ok(())
        }
        Some(Command::Devices) => {
            for device in list_input_devices()? {
                let marker = if device.is_default { " (default)" } else { "" };
                println!("{}{marker}", device.label);
            }
            Ok(())
        }
        None => {
            let mut config = Config::load_or_create(&paths)?;
            config.validate()?;
            if let Some(device) = cli.run.device {
                config.audio.device = device;
            }
            chat::run(&config, &paths, cli.run.template.as_deref())
        }
    }
}
