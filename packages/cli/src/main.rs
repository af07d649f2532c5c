//! hierarchy-sync command line
//!
//! Thin wrapper over `hierarchy-sync-core`: resolves configuration, opens the
//! database, and dispatches to export/import/check/tree.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::Cli;
use hierarchy_sync_core::HierarchySyncConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so `export` can stream JSON on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new("hierarchy_sync=info,hierarchy_sync_core=info")
            }),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = HierarchySyncConfig::from_env().map_err(anyhow::Error::msg)?;
    if let Some(db) = cli.db {
        config.database_path = Some(db);
    }
    config.validate().map_err(anyhow::Error::msg)?;

    commands::run(cli.cmd, config).await
}
