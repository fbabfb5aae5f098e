use std::fmt::Display;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use redis::Client;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// LLM summary of one company, per model so switching models invalidates it
    CompanySummary { company_id: i64, model: String },
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::CompanySummary { company_id, model } => {
                write!(f, "summary:{}:{}", model.to_lowercase(), company_id)
            }
        }
    }
}

pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    Ok(Client::open(redis_url)?)
}

/// A serialized value waiting to be written
struct PendingWrite {
    key: String,
    payload: String,
    ttl: u64,
}

/// Redis-backed cache for expensive, regenerable values
///
/// Reads go straight to Redis; writes are queued to a background task so a slow
/// or unavailable Redis never holds up a response. Any Redis failure is treated
/// as a cache miss.
#[derive(Clone)]
pub struct Cache {
    client: Client,
    writes: mpsc::UnboundedSender<PendingWrite>,
}

/// Stops the background writer once queued writes are flushed
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl CacheWriterHandle {
    /// Signals the writer and waits until it has drained its queue
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Cache writer task panicked");
        }
    }
}

impl Cache {
    /// Creates the cache and spawns its writer task
    pub fn new(client: Client) -> (Self, CacheWriterHandle) {
        let (writes, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let task = tokio::spawn(run_writer(client.clone(), write_rx, shutdown_rx));

        (
            Self { client, writes },
            CacheWriterHandle { shutdown_tx, task },
        )
    }

    /// Returns the cached value, or `None` on a miss, a Redis error or an
    /// entry that no longer deserializes
    pub async fn lookup<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let raw = match self.read(key).await {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!(key = %key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding unreadable cache entry");
                None
            }
        }
    }

    async fn read(&self, key: &CacheKey) -> AppResult<Option<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn.get(key.to_string()).await?)
    }

    /// Queues a value to be stored for `ttl` seconds. Returns false if the
    /// value could not be queued.
    pub fn store_in_background<T: Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) -> bool {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(key = %key, error = %e, "Cache serialization error");
                return false;
            }
        };

        let write = PendingWrite {
            key: key.to_string(),
            payload,
            ttl,
        };

        if self.writes.send(write).is_err() {
            tracing::warn!(key = %key, "Cache writer has stopped; dropping write");
            return false;
        }
        true
    }
}

/// Applies queued writes over one reused connection, reconnecting after failures
async fn run_writer(
    client: Client,
    mut write_rx: mpsc::UnboundedReceiver<PendingWrite>,
    mut shutdown_rx: mpsc::Receiver<()>,
) {
    let mut conn: Option<MultiplexedConnection> = None;

    loop {
        tokio::select! {
            Some(write) = write_rx.recv() => {
                apply(&client, &mut conn, write).await;
            }
            _ = shutdown_rx.recv() => {
                // Senders live on in every Cache clone, so the channel never
                // closes by itself; drain only what is already queued
                write_rx.close();
                let mut flushed = 0usize;
                while let Ok(write) = write_rx.try_recv() {
                    apply(&client, &mut conn, write).await;
                    flushed += 1;
                }
                tracing::info!(flushed, "Cache writer stopped");
                break;
            }
        }
    }
}

async fn apply(client: &Client, conn: &mut Option<MultiplexedConnection>, write: PendingWrite) {
    if conn.is_none() {
        match client.get_multiplexed_async_connection().await {
            Ok(c) => *conn = Some(c),
            Err(e) => {
                tracing::error!(key = %write.key, error = %e, "Cache write skipped, Redis unreachable");
                return;
            }
        }
    }

    let Some(c) = conn.as_mut() else {
        return;
    };

    let result: redis::RedisResult<()> = c.set_ex(&write.key, &write.payload, write.ttl).await;
    if let Err(e) = result {
        tracing::error!(key = %write.key, error = %e, "Cache write failed");
        *conn = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_display_company_summary() {
        let key = CacheKey::CompanySummary {
            company_id: 42,
            model: "gpt-4.1-mini".to_string(),
        };
        assert_eq!(key.to_string(), "summary:gpt-4.1-mini:42");
    }

    #[test]
    fn test_cache_key_display_lowercases_model() {
        let key = CacheKey::CompanySummary {
            company_id: 7,
            model: "GPT-4O".to_string(),
        };
        assert_eq!(key.to_string(), "summary:gpt-4o:7");
    }

    #[tokio::test]
    async fn test_unreachable_redis_reads_as_miss() {
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (cache, handle) = Cache::new(client);

        let key = CacheKey::CompanySummary {
            company_id: 1,
            model: "test".to_string(),
        };
        let value: Option<String> = cache.lookup(&key).await;
        assert!(value.is_none());

        assert!(cache.store_in_background(&key, &"ignored".to_string(), 60));
        handle.shutdown().await;
        assert!(!cache.store_in_background(&key, &"too late".to_string(), 60));
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_queued_writes_are_flushed_on_shutdown() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

        let client = create_redis_client(&redis_url).unwrap();
        let (cache, handle) = Cache::new(client.clone());

        let key = CacheKey::CompanySummary {
            company_id: -1,
            model: "test".to_string(),
        };
        cache.store_in_background(&key, &"cached summary".to_string(), 60);
        handle.shutdown().await;

        let retrieved: Option<String> = cache.lookup(&key).await;
        assert_eq!(retrieved.as_deref(), Some("cached summary"));

        let mut conn = client.get_multiplexed_async_connection().await.unwrap();
        let _: () = conn.del(key.to_string()).await.unwrap();
    }
}
