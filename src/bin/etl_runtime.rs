//! ETL Runtime
//!
//! Production entry point for the ingestion pipeline:
//! - Initializes the SQLite database with schema
//! - Opens the shared listing store
//! - Spawns the ingestion loop over the JSONL drop-file source
//! - Serves as the host process for the metrics query facade
//!
//! Usage:
//!   cargo run --release --bin etl_runtime
//!
//! Environment variables:
//!   PETFLOW_DB_PATH - SQLite database path (default: /var/lib/petflow/petflow.db)
//!   PETFLOW_DROP_DIR - JSONL drop directory (default: drops)
//!   PETFLOW_ORGS - Comma-separated organization ids for scheduled sync
//!   ENABLE_ETL - Master switch (default: false)
//!   SYNC_INTERVAL_MS - Scheduled sync interval (default: 300000)

use dotenv::dotenv;
use log::{error, info};
use petflow::pipeline::{
    config::EtlConfig,
    fetch::{JsonlListingSource, ListingSource},
    ingestion::{start_etl_ingestion, IngestJob},
    reconciler::Reconciler,
    store::{run_schema_migrations, ListingStore},
};
use petflow::query::MetricsQuery;
use rusqlite::Connection;
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize environment and logging
    dotenv().ok();
    env_logger::init();

    info!("🚀 Petflow ETL Runtime");

    // Load configuration
    let config = EtlConfig::from_env();

    if !config.enabled {
        info!("⚠️  ETL is DISABLED (set ENABLE_ETL=true to activate)");
        info!("   └─ Exiting gracefully...");
        return Ok(());
    }

    info!("✅ ETL ENABLED");
    info!("   ├─ Database: {}", config.db_path);
    info!("   ├─ Drop dir: {}", config.drop_dir);
    info!("   ├─ Organizations: {:?}", config.organizations);
    info!("   ├─ Sync interval: {}ms", config.sync_interval_ms);
    info!("   └─ Page size: {}", config.page_size);

    // Initialize database
    info!("🔧 Initializing database...");
    let mut conn = Connection::open(&config.db_path)?;
    run_schema_migrations(&mut conn, "sql")?;
    drop(conn); // Close temporary connection

    // Open the shared store handle
    let store = Arc::new(ListingStore::open(&config.db_path)?);
    info!("✅ Listing store opened");

    // The facade lives here so an embedding API layer can query it;
    // this runtime keeps it warm alongside ingestion.
    let _metrics_query = MetricsQuery::new(store.clone());

    let reconciler = Arc::new(Reconciler::new(store));
    let source: Arc<dyn ListingSource> =
        Arc::new(JsonlListingSource::new(&config.drop_dir, config.page_size));

    // On-demand ingest trigger channel (fed by the external API layer)
    let (tx, rx) = mpsc::channel::<IngestJob>(config.channel_buffer);
    info!("✅ Ingest channel created (buffer: {})", config.channel_buffer);

    // Spawn the ingestion loop
    let organizations = config.organizations.clone();
    let sync_interval = config.sync_interval_ms;
    tokio::spawn(async move {
        start_etl_ingestion(rx, reconciler, source, organizations, sync_interval).await;
    });
    info!("✅ Ingestion task spawned");
    info!("");
    info!("🔄 Press CTRL+C to shutdown gracefully");

    // Wait for CTRL+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("");
            info!("⚠️  Received CTRL+C, shutting down...");
        }
        Err(err) => {
            error!("❌ Failed to listen for CTRL+C: {}", err);
        }
    }

    // Cleanup: Drop tx to close channel
    drop(tx);

    // Give the ingestion loop time to finish its final sweep
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    info!("✅ ETL runtime stopped");
    Ok(())
}
