//! Snapshot file writer.
//!
//! Each key read from the source becomes exactly three newline-terminated lines:
//!
//! 1. the raw key bytes,
//! 2. `0` when the key has no expiry, otherwise the remaining TTL in milliseconds
//!    multiplied by 1000,
//! 3. the `DUMP` payload in the standard base64 alphabet without padding.
//!
//! Records are written in transfer order and never rewritten.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::error::MigrateError;
use crate::types::{TransferRecord, Ttl};

/// Scale applied to the millisecond TTL in the second line of a record.
pub const TTL_FIELD_SCALE: u128 = 1000;

/// Renders the TTL line of a record (without the newline).
pub fn encode_ttl_field(ttl: Ttl) -> String {
    match ttl {
        Ttl::Persistent => "0".to_string(),
        Ttl::Expires(d) => (d.as_millis() * TTL_FIELD_SCALE).to_string(),
    }
}

/// Append-only sink for [`TransferRecord`]s.
pub struct SnapshotWriter<W> {
    out: BufWriter<W>,
    records: usize,
}

impl SnapshotWriter<tokio::fs::File> {
    /// Creates (or truncates) the snapshot file at `path`.
    pub async fn create(path: &Path) -> Result<Self, MigrateError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let file = tokio::fs::File::create(path).await?;
        debug!("Writing snapshot to {:?}", path);
        Ok(Self::new(file))
    }
}

impl<W: AsyncWrite + Unpin + Send> SnapshotWriter<W> {
    /// Wraps an arbitrary writer.
    pub fn new(inner: W) -> Self {
        Self {
            out: BufWriter::new(inner),
            records: 0,
        }
    }

    /// Appends one record and flushes it, so an interrupted run keeps every
    /// record written so far.
    pub async fn append(&mut self, record: &TransferRecord) -> Result<(), MigrateError> {
        self.out.write_all(record.key.as_bytes()).await?;
        self.out.write_all(b"\n").await?;
        self.out
            .write_all(encode_ttl_field(record.ttl).as_bytes())
            .await?;
        self.out.write_all(b"\n").await?;
        self.out
            .write_all(STANDARD_NO_PAD.encode(&record.payload).as_bytes())
            .await?;
        self.out.write_all(b"\n").await?;
        self.out.flush().await?;
        self.records += 1;
        Ok(())
    }

    /// Number of records appended so far.
    pub fn records(&self) -> usize {
        self.records
    }

    /// Flushes buffered records and shuts the sink down, returning the inner writer.
    pub async fn finish(mut self) -> Result<W, MigrateError> {
        self.out.flush().await?;
        self.out.shutdown().await?;
        Ok(self.out.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Key;
    use std::time::Duration;

    #[test]
    fn test_ttl_field_encoding() {
        assert_eq!(encode_ttl_field(Ttl::Persistent), "0");
        assert_eq!(
            encode_ttl_field(Ttl::Expires(Duration::from_secs(5))),
            "5000000"
        );
        assert_eq!(
            encode_ttl_field(Ttl::Expires(Duration::from_millis(1))),
            "1000"
        );
    }

    #[tokio::test]
    async fn test_records_are_three_lines_each() {
        let mut writer = SnapshotWriter::new(Vec::new());
        writer
            .append(&TransferRecord {
                key: Key::from("a"),
                ttl: Ttl::Persistent,
                payload: b"1".to_vec(),
            })
            .await
            .unwrap();
        writer
            .append(&TransferRecord {
                key: Key::from("session:b"),
                ttl: Ttl::Expires(Duration::from_millis(2_500)),
                payload: vec![0x00, 0xff, 0x10, 0x20],
            })
            .await
            .unwrap();
        assert_eq!(writer.records(), 2);

        let out = String::from_utf8(writer.finish().await.unwrap()).unwrap();
        assert_eq!(out, "a\n0\nMQ\nsession:b\n2500000\nAP8QIA\n");
    }

    #[tokio::test]
    async fn test_payload_line_decodes_to_original_bytes() {
        let payload: Vec<u8> = (0u8..=255).collect();
        let mut writer = SnapshotWriter::new(Vec::new());
        writer
            .append(&TransferRecord {
                key: Key::from("bin"),
                ttl: Ttl::Persistent,
                payload: payload.clone(),
            })
            .await
            .unwrap();
        let out = String::from_utf8(writer.finish().await.unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(!lines[2].ends_with('='));
        assert_eq!(STANDARD_NO_PAD.decode(lines[2]).unwrap(), payload);
    }

    #[tokio::test]
    async fn test_appended_records_reach_disk_before_finish() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keys.dump");
        let mut writer = SnapshotWriter::create(&path).await.unwrap();
        for i in 0..50 {
            writer
                .append(&TransferRecord {
                    key: Key::from(format!("key:{}", i).as_str()),
                    ttl: Ttl::Persistent,
                    payload: b"v".to_vec(),
                })
                .await
                .unwrap();
        }

        // the run is cut short: the writer is never finished
        std::mem::forget(writer);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 150);
        assert!(contents.starts_with("key:0\n0\ndg\n"));
        assert!(contents.ends_with("key:49\n0\ndg\n"));
    }

    #[tokio::test]
    async fn test_create_truncates_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("keys.dump");
        tokio::fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        tokio::fs::write(&path, "stale\n").await.unwrap();

        let mut writer = SnapshotWriter::create(&path).await.unwrap();
        writer
            .append(&TransferRecord {
                key: Key::from("k"),
                ttl: Ttl::Persistent,
                payload: b"v".to_vec(),
            })
            .await
            .unwrap();
        writer.finish().await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents, "k\n0\ndg\n");
    }
}
