use std::sync::Arc;

use crate::config::Config;
use crate::db::ArtifactStore;
use crate::services::posters::PosterLookup;
use crate::services::recommender::Recommender;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recommender: Arc<Recommender>,
    pub store: Arc<dyn ArtifactStore>,
    pub posters: Arc<dyn PosterLookup>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates state with an `Unbuilt` recommender
    pub fn new(
        config: Config,
        store: Arc<dyn ArtifactStore>,
        posters: Arc<dyn PosterLookup>,
    ) -> Self {
        Self {
            recommender: Arc::new(Recommender::new()),
            store,
            posters,
            config: Arc::new(config),
        }
    }
}
