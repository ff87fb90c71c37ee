//! ytplay CLI - Headless playback diagnostics
//!
//! Features:
//! - Source resolution for a stored file, as the player would do it
//! - User agent capability probing
//! - Server-generated HLS manifest inspection

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;
use ytplay_core::MediaItem;

mod commands;
mod output;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// ytplay CLI - Playback diagnostics for the download manager
#[derive(Parser)]
#[command(name = "ytplay-cli")]
#[command(version)]
#[command(about = "Playback diagnostics for the download manager web player", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Base URL of the download manager API (overrides the config file)
    #[arg(long)]
    base_url: Option<Url>,

    /// User agent to probe capabilities for
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    user_agent: String,

    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the playback sources for a stored file
    Resolve {
        /// File name on the server
        path: String,

        /// Folder the file lives in
        #[arg(long)]
        folder: Option<String>,
    },

    /// Show the capabilities detected for a user agent
    ProbeUa {
        /// User agent string
        user_agent: String,
    },

    /// Fetch and summarize the HLS manifest the server generates for a file
    Manifest {
        /// File name on the server
        path: String,

        /// Folder the file lives in
        #[arg(long)]
        folder: Option<String>,
    },
}

fn item(path: String, folder: Option<String>) -> MediaItem {
    let item = MediaItem::new(path);
    match folder {
        Some(folder) => item.with_folder(folder),
        None => item,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();
    ytplay_core::init();

    match cli.command {
        Commands::Resolve { path, folder } => {
            let config = commands::load_config(cli.config.as_deref(), cli.base_url)?;
            commands::resolve(&config, &cli.user_agent, &item(path, folder), &cli.format).await?;
        }
        Commands::ProbeUa { user_agent } => {
            commands::probe_ua(&user_agent, &cli.format)?;
        }
        Commands::Manifest { path, folder } => {
            let config = commands::load_config(cli.config.as_deref(), cli.base_url)?;
            commands::manifest(&config, &item(path, folder), &cli.format).await?;
        }
    }

    Ok(())
}
