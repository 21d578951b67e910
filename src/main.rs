//! cbz-stream main entry point
//!
//! This is the command-line interface for the cbz-stream archive server.

use anyhow::Context;
use cbz_stream::config::{load_config, validate, Config};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// cbz-stream: a streaming series archiver
///
/// Serves `GET /?series_url=<url>`, which fetches every chapter of a series and
/// streams it back as an archive of per-chapter archives.
#[derive(Parser, Debug)]
#[command(name = "cbz-stream")]
#[command(version)]
#[command(about = "A streaming series archiver", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration file
    #[arg(long, value_name = "ADDR")]
    bind: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate the configuration, print it and exit
    #[arg(long)]
    check_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?
        }
        None => Config::default(),
    };

    if let Some(bind) = cli.bind {
        config.server.bind_address = bind;
        validate(&config).context("invalid --bind address")?;
    }

    if cli.check_config {
        print_config(&config);
        return Ok(());
    }

    cbz_stream::server::serve(&config).await?;
    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("cbz_stream=info,warn"),
            1 => EnvFilter::new("cbz_stream=debug,tower_http=debug,info"),
            2 => EnvFilter::new("cbz_stream=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --check-config: prints the effective configuration
fn print_config(config: &Config) {
    println!("=== cbz-stream configuration ===\n");

    println!("Server:");
    println!("  Bind address: {}", config.server.bind_address);

    println!("\nHTTP client:");
    println!("  User agent: {}", config.http.user_agent);
    println!("  Request timeout: {}s", config.http.request_timeout_secs);
    println!("  Connect timeout: {}s", config.http.connect_timeout_secs);

    println!("\nPipeline:");
    println!(
        "  Download concurrency: {}",
        config.pipeline.download_concurrency
    );
    println!(
        "  Chapter concurrency: {}",
        config.pipeline.chapter_concurrency
    );
    println!("  Stage limit: {}", config.pipeline.stage_limit);
    println!("  Channel capacity: {}", config.pipeline.channel_capacity);
    println!(
        "  Stream buffer: {} bytes",
        config.pipeline.stream_buffer_size
    );
    println!("  Include cover: {}", config.pipeline.include_cover);

    println!("\nSandbox:");
    println!("  Temp root: {}", config.sandbox.temp_root().display());

    println!("\nConfiguration is valid.");
}
