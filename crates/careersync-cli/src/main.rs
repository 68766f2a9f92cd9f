use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use careersync_adapters::FixtureListingFetcher;
use careersync_sync::{
    load_target_registry, run_targets_from_env, store_for_target, SyncConfig, SyncOrchestrator, TargetRun,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "careersync")]
#[command(about = "Keep a CMS collection in sync with a job board listing")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run one sync pass for every enabled target.
    Sync {
        /// Only sync this target.
        #[arg(long)]
        target: Option<String>,
        /// Read the listing from a captured HTML file instead of the live board.
        #[arg(long, requires = "target")]
        fixture: Option<PathBuf>,
    },
    /// Serve `GET /api/{target_id}`.
    Serve,
    /// Print the target registry.
    Targets,
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))
}

async fn sync_from_fixture(target_id: &str, fixture: PathBuf) -> Result<Vec<TargetRun>> {
    let config = SyncConfig::from_env();
    let registry = load_target_registry(&config.targets_path).await?;
    let target = registry
        .find_enabled(target_id)
        .with_context(|| format!("no enabled target named {target_id}"))?;
    let http = config.http_fetcher()?;
    let source = FixtureListingFetcher::new(target.target_id.clone(), fixture, target.base_url.clone());
    let orchestrator = SyncOrchestrator::new(
        Arc::new(source),
        store_for_target(&config, target, &http)?,
        target.collection_id.clone(),
    );
    Ok(vec![TargetRun {
        target_id: target.target_id.clone(),
        outcome: orchestrator.run().await,
    }])
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Sync {
        target: None,
        fixture: None,
    }) {
        Commands::Sync { target, fixture } => {
            let runs = match (target.as_deref(), fixture) {
                (Some(target_id), Some(fixture)) => sync_from_fixture(target_id, fixture).await?,
                (target_id, _) => run_targets_from_env(target_id).await?,
            };
            println!("{}", serde_json::to_string_pretty(&runs).context("serializing sync outcomes")?);
            let failed = runs.iter().filter(|r| !r.outcome.is_success()).count();
            anyhow::ensure!(failed == 0, "{failed} of {} sync runs failed", runs.len());
        }
        Commands::Serve => {
            careersync_web::serve_from_env().await?;
        }
        Commands::Targets => {
            let config = SyncConfig::from_env();
            let registry = load_target_registry(&config.targets_path).await?;
            for target in &registry.targets {
                println!(
                    "{}\t{}\tenabled={}\tcollection={}\t{}",
                    target.target_id, target.display_name, target.enabled, target.collection_id, target.listing_url
                );
            }
        }
    }

    Ok(())
}
