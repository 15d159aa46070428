//! tagchain - resolve metadata and lyrics for audio files
//!
//! Thin CLI over [`tagchain_resolve::Resolver`]. Every command prints JSON
//! on stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tagchain_common::config::{default_cache_path, load_config};
use tagchain_common::logging::init_tracing;
use tagchain_resolve::{Namespace, Resolver, ResolverConfig};
use tracing::info;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    ", built ",
    env!("BUILD_TIMESTAMP"),
    ")"
);

#[derive(Parser)]
#[command(name = "tagchain", version = VERSION, about = "Identify audio files and resolve their metadata and lyrics")]
struct Cli {
    /// Config file (default: $TAGCHAIN_CONFIG, then ~/.config/tagchain/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Persistent cache database, overriding the configured path
    #[arg(long, global = true)]
    cache_path: Option<PathBuf>,

    /// Use the default persistent cache location when no path is configured
    #[arg(long, global = true)]
    persist: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fingerprint a file and resolve its metadata and lyrics
    Resolve { file: PathBuf },

    /// Look up candidates for a precomputed fingerprint
    Identify {
        fingerprint: String,
        /// Track duration in seconds
        #[arg(long)]
        duration: f64,
    },

    /// Look up lyrics by artist and title
    Lyrics { artist: String, title: String },

    /// Show cache statistics
    Stats,

    /// Clear one cache namespace (fingerprint, metadata, lyrics), or all
    Clear { namespace: Option<Namespace> },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml_config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&toml_config.logging).context("Failed to initialize logging")?;
    info!("tagchain {}", VERSION);

    let mut config = ResolverConfig::from_toml(&toml_config);
    if let Some(path) = cli.cache_path {
        config.cache_path = Some(path);
    } else if cli.persist && config.cache_path.is_none() {
        config.cache_path = default_cache_path();
    }
    if let Some(path) = &config.cache_path {
        info!("Cache store: {}", path.display());
    }

    let resolver = Resolver::new(&config)
        .await
        .context("Failed to initialize resolver")?;

    let outcome = run(&resolver, cli.command).await;
    resolver.close().await;
    outcome
}

async fn run(resolver: &Resolver, command: Command) -> Result<()> {
    match command {
        Command::Resolve { file } => {
            let resolution = resolver
                .resolve_file(&file)
                .await
                .with_context(|| format!("Failed to resolve {}", file.display()))?;
            print_json(&resolution)
        }
        Command::Identify {
            fingerprint,
            duration,
        } => {
            let candidates = resolver
                .identify(&fingerprint, duration)
                .await
                .context("AcoustID lookup failed")?;
            print_json(&candidates)
        }
        Command::Lyrics { artist, title } => {
            print_json(&resolver.fetch_lyrics(&artist, &title).await)
        }
        Command::Stats => print_json(&resolver.stats().await.context("Failed to read cache statistics")?),
        Command::Clear { namespace } => {
            match namespace {
                Some(namespace) => resolver.clear_namespace(namespace).await,
                None => resolver.clear_all().await,
            }
            .context("Failed to clear cache")?;
            print_json(&resolver.stats().await.context("Failed to read cache statistics")?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
