use clap::{Parser, Subcommand};
use humantime_serde::re::humantime;
use logtail::cli::run::RunOverrides;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logtail")]
#[command(about = "Tail a remote log stream", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run {
        /// Test run to tail, overriding tail.reference_id
        #[arg(long)]
        reference_id: Option<String>,

        /// Look-back window such as "10m", overriding tail.tail_from
        #[arg(long, value_parser = parse_duration)]
        tail_from: Option<Duration>,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

fn parse_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(value)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logtail=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = logtail::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run {
            reference_id,
            tail_from,
        }) => {
            let overrides = RunOverrides {
                reference_id,
                tail_from,
            };
            logtail::cli::run::run(config_path, overrides).await?;
        }
        None => {
            // Default behavior is to run
            logtail::cli::run::run(config_path, RunOverrides::default()).await?;
        }
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => {
                logtail::cli::config::init(stdout)?;
            }
            ConfigAction::Validate => {
                logtail::cli::config::validate(config_path)?;
            }
        },
    }

    Ok(())
}
