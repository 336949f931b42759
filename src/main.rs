use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use cinematch_api::{
    api::{create_router, AppState},
    config::Config,
    db::{create_redis_client, ArtifactStore, Cache, CacheWriterHandle, FileArtifactStore},
    services::{
        dataset,
        posters::{PlaceholderPosters, PosterLookup, TmdbPosterLookup},
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cinematch_api=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let (posters, cache_handle) = create_poster_lookup(&config);
    tracing::info!(provider = posters.name(), "Poster lookup configured");
    let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::new(&config.artifacts_dir));

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState::new(config, store, posters);

    initialize_artifacts(&state).await;

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server running");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_handle {
        handle.shutdown().await;
    }

    Ok(())
}

/// TMDB lookups when a key is configured, cached in Redis when a URL is configured
fn create_poster_lookup(config: &Config) -> (Arc<dyn PosterLookup>, Option<CacheWriterHandle>) {
    let Some(api_key) = config.tmdb_api_key() else {
        tracing::info!("TMDB_API_KEY not set; posters use the placeholder");
        return (Arc::new(PlaceholderPosters), None);
    };

    let (cache, handle) = match config.redis_url.as_deref().map(create_redis_client) {
        Some(Ok(client)) => {
            let (cache, handle) = Cache::new(client);
            (Some(cache), Some(handle))
        }
        Some(Err(e)) => {
            tracing::warn!(error = %e, "Invalid REDIS_URL; poster caching disabled");
            (None, None)
        }
        None => (None, None),
    };

    let lookup = TmdbPosterLookup::new(
        api_key.to_string(),
        config.tmdb_api_url.clone(),
        config.tmdb_image_base.clone(),
        cache,
    );

    (Arc::new(lookup), handle)
}

/// Loads persisted artifacts, or builds from the dataset if configured to.
/// Either failure leaves the service running in the `Unbuilt` state.
async fn initialize_artifacts(state: &AppState) {
    match state.store.load().await {
        Ok(set) => {
            state.recommender.publish(set).await;
            return;
        }
        Err(e) => tracing::warn!(
            error = %e,
            location = %state.store.location(),
            "No usable artifacts on disk"
        ),
    }

    let Some(path) = state.config.dataset_path.clone() else {
        tracing::warn!("Starting unbuilt; set DATASET_PATH and POST /api/build");
        return;
    };
    if !state.config.build_on_startup {
        tracing::warn!("Starting unbuilt; BUILD_ON_STARTUP is off");
        return;
    }

    let records = match dataset::load_records(Path::new(&path)) {
        Ok(records) => records,
        Err(e) => {
            tracing::error!(error = %e, "Startup build skipped");
            return;
        }
    };

    match state
        .recommender
        .rebuild(records, state.config.build_config(), None)
        .await
    {
        Ok(set) => {
            if let Err(e) = state.store.save(set).await {
                tracing::error!(error = %e, "Failed to persist startup build");
            }
        }
        Err(e) => tracing::error!(error = %e, "Startup build failed"),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutting down");
}
