use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::{
    error::{AppError, AppResult, BuildError},
    models::{BuildConfig, ItemKey, RawRecord, Recommendation},
    services::{artifacts, artifacts::ArtifactSet, query},
};

/// Whether an artifact set has been published yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Unbuilt,
    Ready,
}

/// Process-wide holder of the currently served artifact set.
///
/// Starts `Unbuilt`. A build or load publishes a complete set by swapping the
/// `Arc`; queries clone the `Arc` and read without holding the lock, so a swap
/// never disturbs a query in flight.
#[derive(Default)]
pub struct Recommender {
    current: RwLock<Option<Arc<ArtifactSet>>>,
    build_lock: Arc<Mutex<()>>,
}

impl Recommender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lifecycle(&self) -> Lifecycle {
        match *self.current.read().await {
            Some(_) => Lifecycle::Ready,
            None => Lifecycle::Unbuilt,
        }
    }

    /// The published set, or `NotReady`
    pub async fn snapshot(&self) -> AppResult<Arc<ArtifactSet>> {
        self.current
            .read()
            .await
            .as_ref()
            .cloned()
            .ok_or(AppError::NotReady)
    }

    /// Replaces the published set. Returns the newly published handle.
    pub async fn publish(&self, set: ArtifactSet) -> Arc<ArtifactSet> {
        let set = Arc::new(set);
        let previous = self.current.write().await.replace(set.clone());

        tracing::info!(
            item_count = set.len(),
            replaced = previous.is_some(),
            "Published artifact set"
        );

        set
    }

    pub async fn recommend(&self, key: &ItemKey, top_k: usize) -> AppResult<Vec<Recommendation>> {
        let set = self.snapshot().await?;
        query::recommend(&set, key, top_k)
    }

    pub async fn suggest(&self, q: &str, limit: usize) -> AppResult<Vec<String>> {
        let set = self.snapshot().await?;
        Ok(query::suggest(&set, q, limit))
    }

    /// Builds a fresh set off the async runtime and publishes it on success.
    ///
    /// Only one build runs at a time. On failure or timeout the previously
    /// published set stays in place. A timed-out build keeps running on its
    /// blocking thread and holds the build lock until it finishes, but its
    /// output is discarded.
    pub async fn rebuild(
        &self,
        records: Vec<RawRecord>,
        config: BuildConfig,
        timeout: Option<Duration>,
    ) -> AppResult<Arc<ArtifactSet>> {
        let guard = self
            .build_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| AppError::BuildInProgress)?;

        tracing::info!(
            record_count = records.len(),
            profile = %config.profile,
            "Starting build"
        );

        // The guard travels with the blocking work and comes back with its result
        let task = tokio::task::spawn_blocking(move || {
            let set = artifacts::build(&records, &config).and_then(|out| out.into_artifacts());
            (guard, set)
        });

        let joined = match timeout {
            Some(limit) => tokio::time::timeout(limit, task).await.map_err(|_| {
                tracing::warn!(
                    timeout_secs = limit.as_secs_f64(),
                    "Build timed out; discarding its output"
                );
                BuildError::Timeout(limit)
            })?,
            None => task.await,
        };

        let (_guard, set) = joined.map_err(|e| BuildError::Aborted(e.to_string()))?;
        let set = set.map_err(|e| {
            tracing::error!(error = %e, "Build failed; keeping previous artifacts");
            e
        })?;

        Ok(self.publish(set).await)
    }
}
