//! synonymload - Synonym bulk-load generator

use clap::Parser;
use std::process;
use synload::bulk::{BulkLoader, CommandLoader, PgCopyLoader};
use synload::config::DEFAULT_KEY_SEQUENCE;
use synload::store::{create_pool, PgSynonymStore};
use synload::{Cli, RunContext, RunSummary};
use synload_common::logging::{init_logging, LogConfig, LogLevel, LogOutput};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is normal
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_config = LogConfig::builder()
        .level(if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        })
        .output(LogOutput::Console)
        .log_file_prefix("synonymload")
        .build();

    // Environment variables take precedence
    let log_config = match log_config.merge_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        },
    };

    let _guard = match init_logging(&log_config) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: failed to initialize logging: {}", e);
            process::exit(1);
        },
    };

    match run(cli).await {
        Ok(summary) => {
            info!(
                mode = %summary.mode,
                accepted = summary.stats.accepted,
                rejected = summary.stats.rejected,
                error_file = %summary.error_file.display(),
                "Synonym load complete"
            );
        },
        Err(e) => {
            error!(error = %e, "Synonym load failed");
            eprintln!("Error: {:#}", e);
            process::exit(1);
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let summary_path = cli.summary.clone();
    let show_progress = !cli.verbose;
    let config = cli.into_config()?;

    let pool = create_pool(&config.db)?;
    let store = PgSynonymStore::new(pool.clone(), DEFAULT_KEY_SEQUENCE);

    let loader: Box<dyn BulkLoader> = match config.bcp_command {
        Some(ref command) => Box::new(CommandLoader::new(command)?),
        None => Box::new(PgCopyLoader::new(pool.clone())),
    };

    let summary = RunContext::new(config)
        .with_progress(show_progress)
        .execute(&store, loader.as_ref())
        .await?;

    if let Some(path) = summary_path {
        let json = serde_json::to_string_pretty(&summary)?;
        tokio::fs::write(&path, json).await?;
        info!(path = %path.display(), "Run summary written");
    }

    pool.close().await;
    Ok(summary)
}
