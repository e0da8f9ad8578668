use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod core;
mod poller;
mod source;

use crate::core::settings::Settings;

#[derive(Parser)]
#[command(name = "mdpoll")]
#[command(author, version, about = "Live-preview poller for markdown rendering servers")]
struct Cli {
    /// Path to a config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep a local copy of a page in sync with the server
    Watch {
        /// URL of the rendered markdown page
        url: String,

        /// File the live page is written to
        #[arg(long, short, default_value = "preview.html")]
        output: PathBuf,
    },

    /// Run a single poll cycle and report the outcome
    Once {
        /// URL of the rendered markdown page
        url: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn init_logging(debug: bool, json: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
        return Ok(());
    }

    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(settings.debug, cli.log_json);

    match cli.command {
        Commands::Watch { url, output } => cli::watch::run(&settings, &url, output).await,
        Commands::Once { url, json } => cli::once::run(&settings, &url, json).await,
        Commands::Config => cli::config::run(&settings),
        Commands::Completions { .. } => Ok(()),
    }
}
