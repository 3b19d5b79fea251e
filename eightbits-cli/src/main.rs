//! Main entry point for the 8-bits command-line tools.

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use shared::config::SyncConfig;
use std::{error::Error, path::PathBuf};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt};

mod commands;

/// 8-bits CLI
#[derive(Parser)]
#[command(name = "8-bits CLI")]
#[command(about = "Command-line tools for the 8-bits chat client", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true, help = "Emit logs as JSON lines on stderr")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Subcommands for the 8-bits CLI
#[derive(Subcommand)]
enum Commands {
    /// Replay a shard event script through the post sync engine
    Replay {
        /// Event script, one JSON step per line
        #[arg(help = "Path to a JSON-lines event script (one step per line)")]
        script: PathBuf,

        /// Shard the script belongs to
        #[arg(long, short, default_value = "lobby", help = "Shard id the script's posts belong to")]
        shard: String,

        /// Archive that answers history requests
        #[arg(
            long,
            short,
            help = "JSON array of posts that answers history requests the way list_posts does"
        )]
        archive: Option<PathBuf>,

        /// Path to the configuration file (optional)
        #[arg(
            long,
            short,
            help = "Path to the configuration file (e.g., sync.yaml or sync.json). If not provided, defaults will be used."
        )]
        config: Option<PathBuf>,

        /// Posts per history request
        #[arg(long, help = "Posts per history request, overriding the configuration")]
        page_size: Option<u32>,

        /// Height of the simulated viewport in pixels
        #[arg(long, default_value_t = 600, help = "Height of the simulated viewport in pixels")]
        viewport: i32,

        /// Height of one rendered post in pixels
        #[arg(long, default_value_t = 24, help = "Height of one rendered post in pixels")]
        row_height: i32,

        /// Print the final timeline as JSON
        #[arg(long, help = "Print the final timeline as a JSON array of post records")]
        json: bool,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)
        #[arg(
            long,
            short,
            help = "The shell type for which to generate the completion script (e.g., bash, zsh, fish, powershell)"
        )]
        shell: String,
    },

    /// Generate a configuration file
    Config {
        /// Format of the configuration file to generate (yaml or json). Defaults to yaml.
        #[arg(
            long,
            short,
            help = "Format of the configuration file to generate (yaml or json). Defaults to yaml."
        )]
        format: Option<String>,
    },
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over `log_level`.
fn initialize_tracing(log_level: &str, json: bool) {
    let default_level = log_level.parse::<LevelFilter>().unwrap_or(LevelFilter::INFO);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    });

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true);

    if json {
        fmt_builder.json().with_ansi(false).init();
    } else {
        fmt_builder.with_ansi(false).init();
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            script,
            shard,
            archive,
            config,
            page_size,
            viewport,
            row_height,
            json,
        } => {
            let resolved_config = SyncConfig::load_config(config, page_size)?;
            initialize_tracing(&resolved_config.log_level, cli.log_json);
            let options = commands::replay::ReplayOptions {
                shard: shard.into(),
                archive,
                viewport,
                row_height,
                json,
            };
            commands::replay::replay(&script, &options, &resolved_config)?;
        }
        Commands::Completion { shell } => {
            let shell = shell
                .parse::<clap_complete::Shell>()
                .map_err(|err| format!("Invalid shell type provided: {err}"))?;
            commands::completion::generate_completion(shell);
        }
        Commands::Config { format } => {
            let format = format.unwrap_or_else(|| "yaml".to_string());
            commands::config::generate_config(&format)?;
        }
    }

    Ok(())
}
