//! Poster image lookup
//!
//! Presentation-layer collaborator: resolves a title to an image URL or the
//! placeholder. Lookups never fail from the caller's point of view; any
//! upstream or cache error degrades to [`PosterRef::Placeholder`].
use std::sync::Arc;

use reqwest::Client as HttpClient;
use serde::Deserialize;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{PosterRef, Recommendation},
};

const POSTER_CACHE_TTL: u64 = 604800; // 1 week

#[async_trait::async_trait]
pub trait PosterLookup: Send + Sync {
    /// Resolves a poster for a title, falling back to the placeholder
    async fn poster(&self, title: &str, year: Option<i32>) -> PosterRef;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Always answers with the placeholder. Used when no TMDB key is configured.
pub struct PlaceholderPosters;

#[async_trait::async_trait]
impl PosterLookup for PlaceholderPosters {
    async fn poster(&self, _title: &str, _year: Option<i32>) -> PosterRef {
        PosterRef::Placeholder
    }

    fn name(&self) -> &'static str {
        "placeholder"
    }
}

/// TMDB `search/movie` backed lookup with optional Redis caching
#[derive(Clone)]
pub struct TmdbPosterLookup {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    image_base: String,
    cache: Option<Cache>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    poster_path: Option<String>,
}

impl TmdbPosterLookup {
    pub fn new(api_key: String, api_url: String, image_base: String, cache: Option<Cache>) -> Self {
        Self {
            http_client: HttpClient::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            api_key,
            api_url,
            image_base,
            cache,
        }
    }

    async fn fetch(&self, title: &str, year: Option<i32>) -> AppResult<PosterRef> {
        let url = format!("{}/search/movie", self.api_url.trim_end_matches('/'));

        let mut params = vec![
            ("api_key", self.api_key.clone()),
            ("query", title.to_string()),
        ];
        if let Some(year) = year {
            params.push(("year", year.to_string()));
        }

        let response = self.http_client.get(&url).query(&params).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalApi(format!(
                "TMDB API returned status {}: {}",
                status, body
            )));
        }

        let search: SearchResponse = response.json().await?;

        Ok(search
            .results
            .first()
            .and_then(|r| r.poster_path.as_deref())
            .map(|path| PosterRef::Url(format!("{}{}", self.image_base, path)))
            .unwrap_or(PosterRef::Placeholder))
    }

    async fn lookup(&self, title: &str, year: Option<i32>) -> AppResult<PosterRef> {
        match &self.cache {
            Some(cache) => cached!(
                cache,
                CacheKey::Poster(title.to_string(), year),
                POSTER_CACHE_TTL,
                self.fetch(title, year)
            ),
            None => self.fetch(title, year).await,
        }
    }
}

#[async_trait::async_trait]
impl PosterLookup for TmdbPosterLookup {
    async fn poster(&self, title: &str, year: Option<i32>) -> PosterRef {
        match self.lookup(title, year).await {
            Ok(poster) => poster,
            Err(e) => {
                tracing::warn!(error = %e, title = %title, "Poster lookup failed, using placeholder");
                PosterRef::Placeholder
            }
        }
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

/// Attaches posters to recommendations, one lookup task per result.
///
/// A lookup that panics or fails leaves the placeholder in place.
pub async fn attach_posters(lookup: Arc<dyn PosterLookup>, recommendations: &mut [Recommendation]) {
    let mut tasks = Vec::new();

    for rec in recommendations.iter() {
        let lookup = lookup.clone();
        let (title, year) = (crate::services::normalizer::split_title(&rec.title).0, rec.year);
        tasks.push(tokio::spawn(async move { lookup.poster(&title, year).await }));
    }

    for (rec, task) in recommendations.iter_mut().zip(tasks) {
        rec.poster = Some(match task.await {
            Ok(poster) => poster,
            Err(e) => {
                tracing::error!(error = %e, "Poster task join error");
                PosterRef::Placeholder
            }
        });
    }
}
