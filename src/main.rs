//! search-dispatch command line entry point

use anyhow::Result;
use clap::Parser;
use search_dispatch::{config, ProviderLoader};
use serde_json::json;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Search the web through a prioritized set of providers
#[derive(Debug, Parser)]
#[command(name = "search-dispatch", version, about)]
struct Cli {
    /// Path to a YAML settings file
    #[arg(short, long, env = config::SETTINGS_PATH_ENV)]
    config: Option<PathBuf>,

    /// Maximum number of results
    #[arg(short, long, default_value_t = 10)]
    num: usize,

    /// Merge results from every successful provider
    #[arg(long)]
    combine: bool,

    /// Include per-provider statistics in the output
    #[arg(long)]
    stats: bool,

    /// Search query
    #[arg(required = true)]
    query: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    info!("Starting search-dispatch v{}", search_dispatch::VERSION);

    let mut settings = config::load(cli.config.as_deref())?;
    if cli.combine {
        settings.manager.combine_results = true;
    }

    let manager = ProviderLoader::load(&settings)?;
    info!("Available providers: {:?}", manager.available_providers());

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling search");
                cancel.cancel();
            }
        });
    }

    let query = cli.query.join(" ");
    let outcome = manager.search_with_cancel(&query, cli.num, &cancel).await;

    let mut output = match &outcome {
        Ok(results) => json!({ "query": query, "results": results }),
        Err(err) => json!({ "query": query, "results": [], "error": err.to_string() }),
    };
    if cli.stats {
        output["statistics"] = serde_json::to_value(manager.get_provider_statistics())?;
    }
    println!("{}", serde_json::to_string_pretty(&output)?);

    outcome?;
    Ok(())
}
