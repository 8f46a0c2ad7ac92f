use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::StoreAdapter;
use crate::error::{EngineError, Result};

/// Default per-operation timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// GET-then-SET as one atomic step: renews the key's TTL only if it
/// still holds the expected value, otherwise leaves it untouched.
const RENEW_IF_OWNER_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
    return 1
else
    return 0
end
"#;

/// Production [`StoreAdapter`] backed by Redis. Connections are
/// multiplexed through [`ConnectionManager`], which transparently
/// reconnects on transport failure; this adapter's job is purely to
/// translate the abstract operations into Redis commands and to turn
/// timeouts/transport errors into [`EngineError::StoreUnavailable`]
/// without ever blocking a caller indefinitely.
pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_timeout(url, DEFAULT_TIMEOUT).await
    }

    pub async fn connect_with_timeout(url: &str, timeout: Duration) -> Result<Self> {
        let client = redis::Client::open(url).map_err(EngineError::store_error)?;
        let conn = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| EngineError::store_unavailable("connecting to store timed out"))?
            .map_err(EngineError::store_unavailable)?;
        Ok(RedisStore { conn, timeout })
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = redis::RedisResult<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
                    tracing::warn!(error = %err, "store connection error");
                    Err(EngineError::store_unavailable(err))
                } else {
                    Err(EngineError::store_error(err))
                }
            }
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "store operation timed out");
                Err(EngineError::store_unavailable("store operation timed out"))
            }
        }
    }
}

#[async_trait]
impl StoreAdapter for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.set(key, value)).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        self.with_timeout(conn.set_ex(key, value, ttl_seconds)).await
    }

    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = self
            .with_timeout(
                redis::cmd("SET")
                    .arg(key)
                    .arg(value)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_seconds)
                    .query_async(&mut conn),
            )
            .await?;
        Ok(reply.is_some())
    }

    async fn renew_if_owner(&self, key: &str, expected_value: &str, ttl_seconds: u64) -> Result<bool> {
        let mut conn = self.conn.clone();
        // Check-then-set must be one atomic step or a lease that expired
        // between the check and the set could already belong to another
        // node by the time this renewal writes it. EVAL runs the script
        // server-side as a single operation, so no other client's command
        // can interleave between the GET and the SET.
        let reply: i64 = self
            .with_timeout(
                redis::cmd("EVAL")
                    .arg(RENEW_IF_OWNER_SCRIPT)
                    .arg(1)
                    .arg(key)
                    .arg(expected_value)
                    .arg(ttl_seconds)
                    .query_async(&mut conn),
            )
            .await?;
        Ok(reply == 1)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: u64 = self.with_timeout(conn.del(key)).await?;
        Ok(())
    }

    async fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        // The cursor returned by scan_match and the drain loop that walks
        // it both talk to the server, so both sit inside the one timeout:
        // a partition after the cursor opens must not hang the caller.
        let scan = async move {
            let mut conn = conn;
            let mut iter: redis::AsyncIter<'_, String> = conn.scan_match(pattern).await?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            Ok::<Vec<String>, redis::RedisError>(keys)
        };
        self.with_timeout(scan).await
    }
}
