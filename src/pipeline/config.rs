//! ETL runtime configuration from environment variables

use std::env;

/// Configuration for the ETL runtime.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct EtlConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Directory holding per-organization JSONL drop files
    pub drop_dir: String,

    /// Organizations synced on the periodic tick
    pub organizations: Vec<String>,

    /// Scheduled sync interval in milliseconds
    pub sync_interval_ms: u64,

    /// Buffer size for the on-demand ingest job channel
    pub channel_buffer: usize,

    /// Records per fetched page
    pub page_size: usize,

    /// Master enable flag for the ETL loop
    pub enabled: bool,
}

impl EtlConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `PETFLOW_DB_PATH` (default: /var/lib/petflow/petflow.db)
    /// - `PETFLOW_DROP_DIR` (default: drops)
    /// - `PETFLOW_ORGS` (comma-separated, default: empty)
    /// - `SYNC_INTERVAL_MS` (default: 300000)
    /// - `INGEST_CHANNEL_BUFFER` (default: 64)
    /// - `INGEST_PAGE_SIZE` (default: 100)
    /// - `ENABLE_ETL` (default: false)
    pub fn from_env() -> Self {
        Self {
            db_path: env::var("PETFLOW_DB_PATH")
                .unwrap_or_else(|_| "/var/lib/petflow/petflow.db".to_string()),

            drop_dir: env::var("PETFLOW_DROP_DIR").unwrap_or_else(|_| "drops".to_string()),

            organizations: env::var("PETFLOW_ORGS")
                .map(|s| {
                    s.split(',')
                        .map(|org| org.trim().to_string())
                        .filter(|org| !org.is_empty())
                        .collect()
                })
                .unwrap_or_default(),

            sync_interval_ms: env::var("SYNC_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300_000),

            channel_buffer: env::var("INGEST_CHANNEL_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(64),

            page_size: env::var("INGEST_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(100),

            enabled: env::var("ENABLE_ETL")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(false),
        }
    }
}
