//! keyshift - copy a live Redis key space into another server
//!
//! This library moves every key of a source server into a destination server using the
//! native `DUMP`/`RESTORE` serialization, so values of any type are copied without being
//! interpreted, and each key keeps its remaining time-to-live.
//!
//! # Features
//!
//! - **Online copy**: reads with `PTTL`/`DUMP`, writes with `RESTORE`; neither side is paused
//! - **Safe re-runs**: keys already present at the destination are left untouched
//! - **Bounded retries**: transient read failures are retried a fixed number of times
//! - **Snapshot file**: optional append-only record of every key read from the source
//! - **Manual resume**: skip the first N keys after fixing whatever stopped a run
//!
//! # Example
//!
//! ```no_run
//! use keyshift::{migrate, LogReporter, MigrateConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MigrateConfig {
//!     snapshot_path: Some("keys.dump".into()),
//!     ..MigrateConfig::default()
//! };
//! migrate(&config, &mut LogReporter).await?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod redis_store;
mod retry;
pub mod snapshot;
pub mod store;
pub mod types;

pub use engine::TransferEngine;
pub use error::{ConfigError, MigrateError, ReadStep, StoreError};
pub use orchestrator::{migrate, migrate_between};
pub use progress::{BarLogWriter, BarReporter, LogReporter, ProgressReporter};
pub use redis_store::RedisStore;
pub use snapshot::SnapshotWriter;
pub use store::KeyValueStore;
pub use types::{Endpoint, Key, MigrateConfig, MigrationReport, RetryPolicy, TransferRecord, Ttl};
