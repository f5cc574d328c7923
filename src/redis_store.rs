//! [`KeyValueStore`] over the Redis wire protocol.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo, RedisError};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::StoreError;
use crate::store::KeyValueStore;
use crate::types::{Endpoint, Key, Ttl};

/// `PTTL` reply for a key that does not exist.
const PTTL_NO_KEY: i64 = -2;

/// A connection to one Redis-compatible server.
///
/// Every command is bounded by the endpoint's timeout.
#[derive(Clone)]
pub struct RedisStore {
    conn: MultiplexedConnection,
    timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn connection_info(endpoint: &Endpoint) -> ConnectionInfo {
    ConnectionInfo {
        addr: ConnectionAddr::Tcp(endpoint.host.clone(), endpoint.port),
        redis: RedisConnectionInfo {
            db: endpoint.database,
            username: endpoint.username.clone(),
            password: endpoint.password.clone(),
            ..Default::default()
        },
    }
}

/// Maps a `PTTL` reply to a TTL; `None` when the key is gone.
fn ttl_from_pttl(reply: i64) -> Option<Ttl> {
    if reply == PTTL_NO_KEY {
        None
    } else {
        Some(Ttl::from_millis(reply))
    }
}

fn is_busy_key(err: &RedisError) -> bool {
    err.code() == Some("BUSYKEY") || err.to_string().contains("BUSYKEY")
}

impl RedisStore {
    /// Opens a multiplexed connection to `endpoint`.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self, StoreError> {
        debug!(endpoint = %endpoint, "connecting");
        let client = redis::Client::open(connection_info(endpoint))?;
        let timeout = endpoint.timeout;
        let conn = tokio::time::timeout(timeout, client.get_multiplexed_tokio_connection())
            .await
            .map_err(|_| StoreError::Timeout {
                command: "CONNECT",
                timeout,
            })??;
        Ok(Self { conn, timeout })
    }

    async fn bounded<T, F>(&self, command: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, RedisError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout {
                command,
                timeout: self.timeout,
            }),
        }
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = self
            .bounded("PING", redis::cmd("PING").query_async(&mut conn))
            .await?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<Key>, StoreError> {
        let mut conn = self.conn.clone();
        let keys: Vec<Vec<u8>> = self
            .bounded("KEYS", redis::cmd("KEYS").arg("*").query_async(&mut conn))
            .await?;
        Ok(keys.into_iter().map(Key::from).collect())
    }

    async fn remaining_ttl(&self, key: &Key) -> Result<Option<Ttl>, StoreError> {
        let mut conn = self.conn.clone();
        let reply: i64 = self
            .bounded(
                "PTTL",
                redis::cmd("PTTL").arg(key.as_bytes()).query_async(&mut conn),
            )
            .await?;
        Ok(ttl_from_pttl(reply))
    }

    async fn dump(&self, key: &Key) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let payload: Option<Vec<u8>> = self
            .bounded(
                "DUMP",
                redis::cmd("DUMP").arg(key.as_bytes()).query_async(&mut conn),
            )
            .await?;
        Ok(payload)
    }

    async fn restore(&self, key: &Key, ttl: Ttl, payload: &[u8]) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let result: Result<(), StoreError> = self
            .bounded(
                "RESTORE",
                redis::cmd("RESTORE")
                    .arg(key.as_bytes())
                    .arg(ttl.as_millis())
                    .arg(payload)
                    .query_async(&mut conn),
            )
            .await;
        match result {
            Err(StoreError::Redis(e)) if is_busy_key(&e) => Err(StoreError::KeyExists),
            other => other,
        }
    }
}
