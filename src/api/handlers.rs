use std::path::PathBuf;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{ItemKey, PosterRef, Profile, Recommendation},
    services::{dataset, posters, recommender::Lifecycle},
};

use super::AppState;

const DEFAULT_TOP_K: usize = 5;
const DEFAULT_SUGGESTION_LIMIT: usize = 20;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct RecommendQuery {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    /// Kept as text so a malformed value is a 400 from us, not a rejection
    #[serde(default)]
    pub top_k: Option<String>,
    #[serde(default)]
    pub posters: bool,
}

impl RecommendQuery {
    fn key(&self) -> AppResult<ItemKey> {
        let non_empty = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match (non_empty(&self.id), non_empty(&self.title)) {
            (Some(id), _) => Ok(ItemKey::Id(id)),
            (None, Some(title)) => Ok(ItemKey::Title(title)),
            (None, None) => Err(AppError::InvalidInput("missing title".to_string())),
        }
    }

    fn top_k(&self) -> AppResult<usize> {
        match self.top_k.as_deref().map(str::trim) {
            None | Some("") => Ok(DEFAULT_TOP_K),
            Some(raw) => match raw.parse::<usize>() {
                Ok(k) if k >= 1 => Ok(k),
                _ => Err(AppError::InvalidInput(format!(
                    "top_k must be a positive integer, got '{}'",
                    raw
                ))),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecommendResponse {
    pub query: String,
    pub requested: usize,
    pub returned: usize,
    /// Fewer results than requested were available
    pub partial: bool,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Deserialize)]
pub struct SuggestionsQuery {
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuggestionsResponse {
    pub suggestions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub state: Lifecycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vocabulary_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BuildResponse {
    pub item_count: usize,
    pub vocabulary_size: usize,
    pub built_at: DateTime<Utc>,
    pub persisted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PosterQuery {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PosterResponse {
    pub poster: PosterRef,
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Top-K movies most similar to the requested title or id
pub async fn recommend(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<RecommendQuery>,
) -> AppResult<Json<RecommendResponse>> {
    let key = params.key()?;
    let top_k = params.top_k()?;

    tracing::info!(request_id = %request_id, key = %key, top_k, "Processing recommendation request");

    let mut recommendations = state.recommender.recommend(&key, top_k).await?;

    if params.posters {
        posters::attach_posters(state.posters.clone(), &mut recommendations).await;
    }

    let returned = recommendations.len();
    if returned < top_k {
        tracing::info!(
            request_id = %request_id,
            requested = top_k,
            returned,
            "Fewer recommendations available than requested"
        );
    }

    Ok(Json(RecommendResponse {
        query: key.to_string(),
        requested: top_k,
        returned,
        partial: returned < top_k,
        recommendations,
    }))
}

/// Title autocomplete over the served catalogue
pub async fn suggestions(
    State(state): State<AppState>,
    Query(params): Query<SuggestionsQuery>,
) -> AppResult<Json<SuggestionsResponse>> {
    let limit = params.limit.unwrap_or(DEFAULT_SUGGESTION_LIMIT);
    let suggestions = state.recommender.suggest(&params.q, limit).await?;
    Ok(Json(SuggestionsResponse { suggestions }))
}

/// Lifecycle state and a summary of the published artifact set
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    match state.recommender.snapshot().await {
        Ok(set) => {
            let manifest = set.manifest();
            Json(StatusResponse {
                state: Lifecycle::Ready,
                item_count: Some(set.len()),
                vocabulary_size: Some(manifest.vocabulary_size),
                profile: Some(manifest.build.profile),
                built_at: Some(manifest.built_at),
            })
        }
        Err(_) => Json(StatusResponse {
            state: Lifecycle::Unbuilt,
            item_count: None,
            vocabulary_size: None,
            profile: None,
            built_at: None,
        }),
    }
}

/// Rebuilds from the configured dataset, publishes, then persists.
///
/// A save failure is reported in the response; the new set stays published.
pub async fn build(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> AppResult<Json<BuildResponse>> {
    let path = state
        .config
        .dataset_path
        .clone()
        .map(PathBuf::from)
        .ok_or_else(|| AppError::InvalidInput("DATASET_PATH is not configured".to_string()))?;

    tracing::info!(request_id = %request_id, dataset = %path.display(), "Build requested");

    let records = tokio::task::spawn_blocking(move || dataset::load_records(&path))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    let set = state
        .recommender
        .rebuild(
            records,
            state.config.build_config(),
            Some(state.config.build_timeout()),
        )
        .await?;

    let (persisted, warning) = match state.store.save(set.clone()).await {
        Ok(()) => (true, None),
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to persist artifacts");
            (false, Some(e.to_string()))
        }
    };

    Ok(Json(BuildResponse {
        item_count: set.len(),
        vocabulary_size: set.manifest().vocabulary_size,
        built_at: set.manifest().built_at,
        persisted,
        warning,
    }))
}

/// Poster for a single title
pub async fn poster(
    State(state): State<AppState>,
    Query(params): Query<PosterQuery>,
) -> AppResult<Json<PosterResponse>> {
    if params.title.trim().is_empty() {
        return Err(AppError::InvalidInput("missing title".to_string()));
    }
    let poster = state.posters.poster(params.title.trim(), params.year).await;
    Ok(Json(PosterResponse { poster }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use crate::db::artifacts::MockArtifactStore;
    use crate::error::PersistenceError;
    use crate::services::posters::PlaceholderPosters;

    fn query(title: Option<&str>, id: Option<&str>, top_k: Option<&str>) -> RecommendQuery {
        RecommendQuery {
            title: title.map(str::to_string),
            id: id.map(str::to_string),
            top_k: top_k.map(str::to_string),
            posters: false,
        }
    }

    #[test]
    fn test_key_prefers_id() {
        assert_eq!(
            query(Some("Heat"), Some("6"), None).key().unwrap(),
            ItemKey::Id("6".to_string())
        );
        assert_eq!(
            query(Some(" Heat "), Some(""), None).key().unwrap(),
            ItemKey::Title("Heat".to_string())
        );
        assert!(query(Some("  "), None, None).key().is_err());
    }

    #[test]
    fn test_top_k_parsing() {
        assert_eq!(query(None, None, None).top_k().unwrap(), DEFAULT_TOP_K);
        assert_eq!(query(None, None, Some("3")).top_k().unwrap(), 3);
        assert!(query(None, None, Some("0")).top_k().is_err());
        assert!(query(None, None, Some("-2")).top_k().is_err());
        assert!(query(None, None, Some("many")).top_k().is_err());
    }

    #[tokio::test]
    async fn test_build_reports_save_failure_but_stays_published() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = dir.path().join("movies.csv");
        std::fs::write(
            &dataset,
            "movieId,title,genres\n1,Toy Story (1995),Animation|Comedy\n6,Heat (1995),Action|Crime\n",
        )
        .unwrap();

        let mut store = MockArtifactStore::new();
        store
            .expect_save()
            .returning(|_| Err(PersistenceError::Missing("read-only".to_string())));

        let config = Config {
            dataset_path: Some(dataset.display().to_string()),
            ..Config::default()
        };
        let state = AppState::new(config, Arc::new(store), Arc::new(PlaceholderPosters));

        let Json(response) = build(State(state.clone()), Extension(RequestId::new()))
            .await
            .unwrap();

        assert_eq!(response.item_count, 2);
        assert!(!response.persisted);
        assert!(response.warning.is_some());
        assert_eq!(state.recommender.lifecycle().await, Lifecycle::Ready);
    }

    #[tokio::test]
    async fn test_build_without_dataset_is_invalid_input() {
        let state = AppState::new(
            Config::default(),
            Arc::new(MockArtifactStore::new()),
            Arc::new(PlaceholderPosters),
        );
        let err = build(State(state), Extension(RequestId::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
