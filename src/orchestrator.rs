//! Main orchestration logic for a migration run.

use std::path::Path;
use tracing::{error, info};

use crate::engine::TransferEngine;
use crate::error::MigrateError;
use crate::progress::ProgressReporter;
use crate::redis_store::RedisStore;
use crate::snapshot::SnapshotWriter;
use crate::store::KeyValueStore;
use crate::types::{MigrateConfig, MigrationReport};

/// Copies every key from the configured source server to the destination server.
///
/// This is the main entry point. It performs the following steps:
///
/// 1. Connects to both servers and checks that they answer `PING`
/// 2. Opens the snapshot file, if one is configured
/// 3. Transfers keys one at a time, starting after `resume_offset`
/// 4. Flushes and closes the snapshot file, whether or not the transfer succeeded
/// 5. Writes the JSON run report, if one is configured
///
/// # Example
///
/// ```no_run
/// use keyshift::{migrate, LogReporter, MigrateConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = MigrateConfig::default();
/// let report = migrate(&config, &mut LogReporter).await?;
/// println!("copied {} keys", report.copied);
/// # Ok(())
/// # }
/// ```
pub async fn migrate(
    config: &MigrateConfig,
    reporter: &mut dyn ProgressReporter,
) -> Result<MigrationReport, MigrateError> {
    info!("Source: {}", config.source);
    info!("Destination: {}", config.destination);

    let source = RedisStore::connect(&config.source)
        .await
        .map_err(|source| MigrateError::Connection {
            role: "source",
            source,
        })?;
    let destination = RedisStore::connect(&config.destination)
        .await
        .map_err(|source| MigrateError::Connection {
            role: "destination",
            source,
        })?;

    migrate_between(&source, &destination, config, reporter).await
}

/// Runs a migration between two already constructed stores.
///
/// Connection settings in `config` are ignored; everything else applies.
pub async fn migrate_between<S, D>(
    source: &S,
    destination: &D,
    config: &MigrateConfig,
    reporter: &mut dyn ProgressReporter,
) -> Result<MigrationReport, MigrateError>
where
    S: KeyValueStore + ?Sized,
    D: KeyValueStore + ?Sized,
{
    source
        .ping()
        .await
        .map_err(|source| MigrateError::Connection {
            role: "source",
            source,
        })?;
    destination
        .ping()
        .await
        .map_err(|source| MigrateError::Connection {
            role: "destination",
            source,
        })?;
    info!("CONNECTED TO SOURCE AND DESTINATION");

    let mut snapshot = match &config.snapshot_path {
        Some(path) => Some(SnapshotWriter::create(path).await?),
        None => None,
    };

    let engine = TransferEngine::new(config.retry, config.resume_offset);
    let outcome = engine
        .run(source, destination, snapshot.as_mut(), reporter)
        .await;

    // The snapshot is closed before any error is surfaced.
    let closed = match snapshot {
        Some(writer) => {
            let records = writer.records();
            writer.finish().await.map(|_| {
                info!("Snapshot closed with {} records", records);
            })
        }
        None => Ok(()),
    };

    let report = match (outcome, closed) {
        (Ok(report), Ok(())) => report,
        (Ok(_), Err(e)) => return Err(e),
        (Err(e), Ok(())) => return Err(e),
        (Err(e), Err(close_err)) => {
            error!("Failed to close snapshot file: {}", close_err);
            return Err(e);
        }
    };

    if let Some(path) = &config.report_path {
        write_report(path, &report).await?;
    }

    Ok(report)
}

/// Persists a run report as pretty-printed JSON.
async fn write_report(path: &Path, report: &MigrationReport) -> Result<(), MigrateError> {
    let json = serde_json::to_string_pretty(report)?;
    tokio::fs::write(path, json).await?;
    info!("Persisted run report to {:?}", path);
    Ok(())
}
