use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Poster lookup by (title, year)
    Poster(String, Option<i32>),
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheKey::Poster(title, Some(year)) => {
                write!(f, "poster:{}:{}", title.to_lowercase(), year)
            }
            CacheKey::Poster(title, None) => write!(f, "poster:{}", title.to_lowercase()),
        }
    }
}

/// Creates a Redis client for poster caching
///
/// Only parses the URL; connections are opened per operation through the
/// multiplexed async connection.
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Message for asynchronous cache writes
struct CacheWriteMessage {
    key: String,
    value: String,
    ttl: u64,
}

/// Redis-backed cache for external lookups.
///
/// Reads go straight to Redis; writes are queued to a background task so a
/// slow cache never delays a response.
#[derive(Clone)]
pub struct Cache {
    redis_client: Client,
    write_tx: mpsc::UnboundedSender<CacheWriteMessage>,
}

/// Handle for gracefully shutting down the cache writer
pub struct CacheWriterHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheWriterHandle {
    /// Initiates a graceful shutdown of the cache writer
    ///
    /// Sends a shutdown signal to the writer task, which then flushes every
    /// write still queued before it exits.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache writer shutdown signal sent");
    }
}

impl Cache {
    /// Creates a new Cache instance with an async write background task
    ///
    /// This spawns a background task that processes cache writes asynchronously,
    /// so storing a poster never blocks the recommendation response. Must be
    /// called from within a tokio runtime. The returned handle shuts the
    /// writer down.
    pub fn new(redis_client: Client) -> (Self, CacheWriterHandle) {
        let (write_tx, write_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let client = redis_client.clone();
        tokio::spawn(async move {
            Self::cache_writer_task(client, write_rx, shutdown_rx).await;
        });

        (
            Self {
                redis_client,
                write_tx,
            },
            CacheWriterHandle { shutdown_tx },
        )
    }

    /// Background task that processes cache write messages
    ///
    /// Continuously receives cache write requests from the channel and writes them
    /// to Redis. A failed write is logged and dropped. On shutdown signal, closes
    /// the channel and flushes all remaining messages before exiting.
    async fn cache_writer_task(
        client: Client,
        mut write_rx: mpsc::UnboundedReceiver<CacheWriteMessage>,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!("Cache writer task started");

        loop {
            tokio::select! {
                Some(msg) = write_rx.recv() => {
                    if let Err(e) = Self::write_to_redis(&client, msg).await {
                        tracing::warn!(error = %e, "Failed to write to Redis cache");
                    }
                }
                _ = shutdown_rx.recv() => {
                    write_rx.close();
                    let mut flushed = 0usize;
                    while let Some(msg) = write_rx.recv().await {
                        if let Err(e) = Self::write_to_redis(&client, msg).await {
                            tracing::warn!(error = %e, "Failed to flush cache write during shutdown");
                        } else {
                            flushed += 1;
                        }
                    }

                    tracing::info!(flushed, "Cache writer task stopped");
                    break;
                }
            }
        }
    }

    /// Writes a single message to Redis with its TTL
    async fn write_to_redis(client: &Client, msg: CacheWriteMessage) -> AppResult<()> {
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: () = conn.set_ex(msg.key, msg.value, msg.ttl).await?;
        Ok(())
    }

    /// Retrieves a value from the cache by key
    ///
    /// This function attempts to retrieve a cached value associated with the given key.
    /// If the key exists in the cache, the value is deserialized and returned.
    /// If the key does not exist, `None` is returned. Connection and
    /// deserialization failures are errors; `cached!` treats them as misses.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let cached: Option<String> = conn.get(key.to_string()).await?;

        cached
            .map(|json| {
                serde_json::from_str(&json).map_err(|e| {
                    AppError::Internal(format!("Cache deserialization error: {}", e))
                })
            })
            .transpose()
    }

    /// Stores a value in the cache asynchronously without blocking
    ///
    /// This function serializes the value and sends it to a background worker
    /// via a channel. The actual Redis write happens asynchronously, so this
    /// method returns immediately without waiting for the write to complete.
    ///
    /// Use this method when you don't need confirmation that the write succeeded
    /// and want to keep lookups off the response path. Writes queued after the
    /// writer has stopped are dropped with a warning.
    pub fn set_in_background<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) {
        let json = match serde_json::to_string(value) {
            Ok(j) => j,
            Err(e) => {
                tracing::error!(error = %e, "Cache serialization error");
                return;
            }
        };

        let msg = CacheWriteMessage {
            key: key.to_string(),
            value: json,
            ttl,
        };

        if self.write_tx.send(msg).is_err() {
            tracing::warn!(key = %key, "Cache writer stopped; dropping write");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_with_year() {
        let key = CacheKey::Poster("Toy Story".to_string(), Some(1995));
        assert_eq!(key.to_string(), "poster:toy story:1995");
    }

    #[test]
    fn test_cache_key_without_year() {
        let key = CacheKey::Poster("AVATAR".to_string(), None);
        assert_eq!(key.to_string(), "poster:avatar");
    }

    #[tokio::test]
    async fn test_writes_after_shutdown_are_dropped() {
        // Client::open only parses the URL; no server is contacted
        let client = create_redis_client("redis://127.0.0.1:1").unwrap();
        let (cache, handle) = Cache::new(client);
        handle.shutdown().await;
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        cache.set_in_background(&CacheKey::Poster("Heat".to_string(), None), &"x", 60);
    }
}
