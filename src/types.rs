//! Data structures for migration runs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// A key as stored in the key space. Keys are binary-safe; they are only rendered
/// as text (lossily) for logs and progress output.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Vec<u8>);

impl Key {
    /// Raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Key(bytes)
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(s.as_bytes().to_vec())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({:?})", String::from_utf8_lossy(&self.0))
    }
}

/// Remaining lifetime of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key never expires.
    Persistent,
    /// The key expires after the given duration.
    Expires(Duration),
}

impl Ttl {
    /// Builds a TTL from a millisecond count as reported by `PTTL`.
    ///
    /// Zero and negative values mean "no expiry".
    pub fn from_millis(ms: i64) -> Self {
        if ms <= 0 {
            Ttl::Persistent
        } else {
            Ttl::Expires(Duration::from_millis(ms as u64))
        }
    }

    /// Milliseconds to pass to `RESTORE`; `0` means no expiry.
    pub fn as_millis(&self) -> u64 {
        match self {
            Ttl::Persistent => 0,
            Ttl::Expires(d) => d.as_millis() as u64,
        }
    }
}

/// One key read from the source: the unit written to the snapshot and replayed
/// to the destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRecord {
    /// Key name.
    pub key: Key,
    /// Remaining TTL at read time.
    pub ttl: Ttl,
    /// Opaque `DUMP` payload.
    pub payload: Vec<u8>,
}

/// Connection parameters for one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name or IP address.
    pub host: String,
    /// TCP port.
    pub port: u16,
    /// ACL user name, if any.
    pub username: Option<String>,
    /// Password, if any.
    pub password: Option<String>,
    /// Logical database index.
    pub database: i64,
    /// Upper bound on a single command round trip.
    pub timeout: Duration,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            username: None,
            password: None,
            database: 0,
            timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Bounded retry discipline shared by every retryable read step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt (default: 3, i.e. 4 attempts).
    pub max_retries: usize,
    /// Fixed pause between attempts. Zero retries immediately.
    pub delay: Duration,
}

impl RetryPolicy {
    /// A policy that retries `max_retries` times without pausing.
    pub fn immediate(max_retries: usize) -> Self {
        Self {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    /// Total attempts a step may make.
    pub fn max_attempts(&self) -> usize {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_millis(250),
        }
    }
}

/// Configuration for a migration run.
///
/// # Example
///
/// ```
/// use keyshift::{Endpoint, MigrateConfig};
///
/// let config = MigrateConfig {
///     source: Endpoint::default(),
///     destination: Endpoint {
///         port: 6380,
///         ..Endpoint::default()
///     },
///     snapshot_path: Some("keys.dump".into()),
///     ..MigrateConfig::default()
/// };
/// assert_eq!(config.resume_offset, 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MigrateConfig {
    /// Store the keys are read from.
    pub source: Endpoint,
    /// Store the keys are restored into.
    pub destination: Endpoint,
    /// Optional snapshot file recording every key read from the source.
    pub snapshot_path: Option<PathBuf>,
    /// Number of enumerated keys to skip before transferring (manual resume).
    pub resume_offset: usize,
    /// Retry policy for TTL and dump fetches.
    pub retry: RetryPolicy,
    /// Optional path for a JSON report of the finished run.
    pub report_path: Option<PathBuf>,
}

/// Outcome counters of a completed run.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Keys enumerated on the source.
    pub total_keys: usize,
    /// Keys passed over because of the resume offset.
    pub skipped: usize,
    /// Keys restored on the destination.
    pub copied: usize,
    /// Keys left untouched because the destination already had them.
    pub conflicts: usize,
    /// Keys deleted from the source between enumeration and read.
    pub vanished: usize,
    /// Wall-clock duration of the transfer loop in milliseconds.
    pub elapsed_ms: u64,
}
