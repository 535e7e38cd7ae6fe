mod cli;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use cli::{Cli, Commands};
use uuid::Uuid;

use gradnet::config;
use gradnet::media::{ImageStore, MetadataFilters, Reconciler};
use gradnet_common::UploaderId;
use gradnet_db::pool::init_pool;

fn reconciler(config_path: Option<&std::path::Path>) -> Result<Reconciler> {
    let config = config::load_config_or_default(config_path)?;

    tracing::info!("Opening media ledger at {}", config.database.path);
    let pool = init_pool(&config.database.path)?;
    let store = ImageStore::new(&config.store);

    Ok(Reconciler::new(store, pool))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("not an RFC3339 timestamp: {s}"))
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Orphans { delete } => {
            let report = reconciler(config_path)?.find_orphans(!delete).await?;
            print_json(&report)
        }
        Commands::Purge { days, delete } => {
            let report = reconciler(config_path)?
                .purge_older_than(days, !delete)
                .await?;
            print_json(&report)
        }
        Commands::Dangling { delete } => {
            let report = reconciler(config_path)?.find_dangling(!delete).await?;
            print_json(&report)
        }
        Commands::Stats => {
            let stats = reconciler(config_path)?.usage_stats().await?;
            print_json(&stats)
        }
        Commands::ListExternal {
            uploader,
            after,
            before,
        } => {
            let filters = MetadataFilters {
                uploader: uploader
                    .map(|s| {
                        Uuid::parse_str(&s)
                            .map(UploaderId::from)
                            .with_context(|| format!("not a UUID: {s}"))
                    })
                    .transpose()?,
                uploaded_after: after.as_deref().map(parse_rfc3339).transpose()?,
                uploaded_before: before.as_deref().map(parse_rfc3339).transpose()?,
            };
            let objects = reconciler(config_path)?
                .list_external_by_metadata(&filters)
                .await?;
            print_json(&objects)
        }
        Commands::Validate { config } => {
            let path = config.as_deref().or(config_path);
            config::load_config_or_default(path)?;
            println!("Configuration OK");
            Ok(())
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respect RUST_LOG env var if set, otherwise use defaults based on the
    // verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "gradnet=trace,gradnet_db=debug,gradnet_common=debug".to_string()
        } else {
            "gradnet=info,gradnet_db=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}
