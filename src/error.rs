//! Error types for migration operations.

use std::io;
use std::time::Duration;
use thiserror::Error;

use crate::types::Key;

/// Errors reported by a [`KeyValueStore`](crate::store::KeyValueStore) implementation.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The destination already holds the key being restored (`BUSYKEY`).
    #[error("target key already exists")]
    KeyExists,

    /// A command did not complete within the configured timeout.
    #[error("command {command} timed out after {}", humantime::format_duration(*.timeout))]
    Timeout {
        /// Command name, e.g. `DUMP`.
        command: &'static str,
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// Error raised by the Redis client or returned by the server.
    #[error(transparent)]
    Redis(#[from] redis::RedisError),

    /// Any other store failure (used by non-Redis implementations).
    #[error("{0}")]
    Other(String),
}

/// Retryable read steps performed against the source store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStep {
    /// `PTTL`
    Ttl,
    /// `DUMP`
    Dump,
}

impl std::fmt::Display for ReadStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadStep::Ttl => f.write_str("TTL fetch"),
            ReadStep::Dump => f.write_str("dump"),
        }
    }
}

/// Errors that abort a migration run.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// A store failed its liveness check before the run started.
    #[error("{role} connection error: {source}")]
    Connection {
        /// `"source"` or `"destination"`.
        role: &'static str,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// Listing the source key space failed.
    #[error("error getting keys: {0}")]
    Enumeration(#[source] StoreError),

    /// A TTL or dump fetch kept failing after every allowed retry.
    #[error("{step} failed for key {key} after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Which read step failed.
        step: ReadStep,
        /// The key being transferred.
        key: Key,
        /// Total attempts made, including the first one.
        attempts: usize,
        /// Error from the final attempt.
        #[source]
        source: StoreError,
    },

    /// Restoring a key on the destination failed for a reason other than a conflict.
    #[error("error restoring key {key}: {source}")]
    Restore {
        /// The key being restored.
        key: Key,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// Writing the snapshot file or the run report failed.
    #[error(transparent)]
    IoError(#[from] io::Error),

    /// Serializing the run report failed.
    #[error(transparent)]
    SerdeJsonError(#[from] serde_json::Error),
}

/// Errors raised while turning flags and environment variables into a config.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment override could not be parsed.
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidEnv {
        /// Environment variable name.
        var: String,
        /// Raw value found in the environment.
        value: String,
        /// Parser message.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_message() {
        let err = StoreError::Timeout {
            command: "PTTL",
            timeout: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "command PTTL timed out after 1m");
    }

    #[test]
    fn test_retries_exhausted_message_names_key() {
        let err = MigrateError::RetriesExhausted {
            step: ReadStep::Dump,
            key: Key::from("user:42"),
            attempts: 4,
            source: StoreError::Other("connection reset".into()),
        };
        assert_eq!(
            err.to_string(),
            "dump failed for key user:42 after 4 attempts: connection reset"
        );
    }
}
