//! Per-key transfer loop.

use std::time::Instant;
use tokio::io::AsyncWrite;
use tracing::{debug, info};

use crate::error::{MigrateError, ReadStep, StoreError};
use crate::progress::ProgressReporter;
use crate::retry::with_retries;
use crate::snapshot::SnapshotWriter;
use crate::store::KeyValueStore;
use crate::types::{Key, MigrationReport, RetryPolicy, TransferRecord};

/// Position of the engine in the enumerated key sequence.
#[derive(Debug, Clone, Copy)]
struct MigrationState {
    resume_offset: usize,
    total_keys: usize,
    current_index: usize,
}

impl MigrationState {
    fn skipped(&self) -> bool {
        self.current_index < self.resume_offset
    }

    /// 1-based position used in progress events.
    fn position(&self) -> usize {
        self.current_index + 1
    }
}

/// Result of transferring a single key.
enum KeyOutcome {
    Copied,
    Conflict,
    Vanished,
}

/// Copies every key of a source store into a destination store, one key at a time.
///
/// Reads are retried under the configured [`RetryPolicy`]; a destination that
/// already holds a key is left alone. Anything else stops the run.
#[derive(Debug, Clone, Default)]
pub struct TransferEngine {
    retry: RetryPolicy,
    resume_offset: usize,
}

impl TransferEngine {
    /// Creates an engine that skips the first `resume_offset` enumerated keys.
    pub fn new(retry: RetryPolicy, resume_offset: usize) -> Self {
        Self {
            retry,
            resume_offset,
        }
    }

    /// Runs the transfer.
    ///
    /// When `sink` is set, every record read from the source is appended to it
    /// before the restore is attempted. The sink is not closed here; the caller
    /// owns it and must [`finish`](SnapshotWriter::finish) it on every path.
    pub async fn run<S, D, W>(
        &self,
        source: &S,
        destination: &D,
        mut sink: Option<&mut SnapshotWriter<W>>,
        reporter: &mut dyn ProgressReporter,
    ) -> Result<MigrationReport, MigrateError>
    where
        S: KeyValueStore + ?Sized,
        D: KeyValueStore + ?Sized,
        W: AsyncWrite + Unpin + Send,
    {
        let started = Instant::now();
        let keys = source
            .list_keys()
            .await
            .map_err(MigrateError::Enumeration)?;

        let mut state = MigrationState {
            resume_offset: self.resume_offset,
            total_keys: keys.len(),
            current_index: 0,
        };
        let mut report = MigrationReport {
            total_keys: state.total_keys,
            ..MigrationReport::default()
        };
        reporter.on_start(state.total_keys, state.resume_offset);

        for (index, key) in keys.into_iter().enumerate() {
            state.current_index = index;
            if state.skipped() {
                report.skipped += 1;
                continue;
            }

            let outcome = self
                .transfer_key(source, destination, sink.as_deref_mut(), key.clone())
                .await?;

            let (position, total) = (state.position(), state.total_keys);
            match outcome {
                KeyOutcome::Copied => {
                    report.copied += 1;
                    debug!("COPIED KEY {}/{} {}", position, total, key);
                    reporter.on_copied(position, total, &key);
                }
                KeyOutcome::Conflict => {
                    report.conflicts += 1;
                    reporter.on_conflict(position, total, &key);
                }
                KeyOutcome::Vanished => {
                    report.vanished += 1;
                    reporter.on_vanished(position, total, &key);
                }
            }
        }

        report.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "Transfer finished: {} copied, {} conflicts, {} vanished, {} skipped of {} keys",
            report.copied, report.conflicts, report.vanished, report.skipped, report.total_keys
        );
        reporter.on_finish(&report);
        Ok(report)
    }

    async fn transfer_key<S, D, W>(
        &self,
        source: &S,
        destination: &D,
        sink: Option<&mut SnapshotWriter<W>>,
        key: Key,
    ) -> Result<KeyOutcome, MigrateError>
    where
        S: KeyValueStore + ?Sized,
        D: KeyValueStore + ?Sized,
        W: AsyncWrite + Unpin + Send,
    {
        let ttl = match with_retries(&self.retry, ReadStep::Ttl, &key, || {
            source.remaining_ttl(&key)
        })
        .await?
        {
            Some(ttl) => ttl,
            None => return Ok(KeyOutcome::Vanished),
        };

        let payload = match with_retries(&self.retry, ReadStep::Dump, &key, || source.dump(&key))
            .await?
        {
            Some(payload) => payload,
            None => return Ok(KeyOutcome::Vanished),
        };

        let record = TransferRecord { key, ttl, payload };
        if let Some(sink) = sink {
            sink.append(&record).await?;
        }

        match destination
            .restore(&record.key, record.ttl, &record.payload)
            .await
        {
            Ok(()) => Ok(KeyOutcome::Copied),
            Err(StoreError::KeyExists) => Ok(KeyOutcome::Conflict),
            Err(e) => Err(MigrateError::Restore {
                key: record.key,
                source: e,
            }),
        }
    }
}
