use serde::Deserialize;

use crate::models::{BuildConfig, Profile, Weighting};

/// Application configuration loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the persisted artifact set
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,

    /// Dataset used by `POST /api/build` and startup builds (.csv or .json)
    #[serde(default)]
    pub dataset_path: Option<String>,

    /// Pipeline preset
    #[serde(default = "default_profile")]
    pub profile: Profile,

    /// Overrides the profile's weighting
    #[serde(default)]
    pub weighting: Option<Weighting>,

    /// Overrides the profile's vocabulary cap
    #[serde(default)]
    pub max_features: Option<usize>,

    #[serde(default)]
    pub cast_limit: Option<usize>,

    #[serde(default)]
    pub crew_fallback_limit: Option<usize>,

    /// Largest catalogue a build accepts
    #[serde(default)]
    pub max_items: Option<usize>,

    /// Build from `dataset_path` at startup when no artifacts can be loaded
    #[serde(default)]
    pub build_on_startup: bool,

    /// Upper bound on an API-triggered build
    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,

    /// TMDB API key; posters fall back to the placeholder without one
    #[serde(default)]
    pub tmdb_api_key: Option<String>,

    #[serde(default = "default_tmdb_api_url")]
    pub tmdb_api_url: String,

    #[serde(default = "default_tmdb_image_base")]
    pub tmdb_image_base: String,

    /// Redis URL for poster caching; caching is off when unset
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Answer cross-origin requests from any origin (the browser front end
    /// is served separately). When off, no CORS headers are sent.
    #[serde(default = "default_cors_allow_any")]
    pub cors_allow_any: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_artifacts_dir() -> String {
    "artifacts".to_string()
}

fn default_profile() -> Profile {
    Profile::GenreTitle
}

fn default_build_timeout_secs() -> u64 {
    300
}

fn default_cors_allow_any() -> bool {
    true
}

fn default_tmdb_api_url() -> String {
    "https://api.themoviedb.org/3".to_string()
}

fn default_tmdb_image_base() -> String {
    "https://image.tmdb.org/t/p/w500".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            artifacts_dir: default_artifacts_dir(),
            dataset_path: None,
            profile: default_profile(),
            weighting: None,
            max_features: None,
            cast_limit: None,
            crew_fallback_limit: None,
            max_items: None,
            build_on_startup: false,
            build_timeout_secs: default_build_timeout_secs(),
            tmdb_api_key: None,
            tmdb_api_url: default_tmdb_api_url(),
            tmdb_image_base: default_tmdb_image_base(),
            redis_url: None,
            cors_allow_any: default_cors_allow_any(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))
    }

    /// The profile preset with any per-field overrides applied
    pub fn build_config(&self) -> BuildConfig {
        let mut build = BuildConfig::for_profile(self.profile);
        if let Some(weighting) = self.weighting {
            build.weighting = weighting;
        }
        if let Some(max_features) = self.max_features {
            build.max_features = Some(max_features);
        }
        if let Some(cast_limit) = self.cast_limit {
            build.cast_limit = cast_limit;
        }
        if let Some(crew_fallback_limit) = self.crew_fallback_limit {
            build.crew_fallback_limit = crew_fallback_limit;
        }
        if let Some(max_items) = self.max_items {
            build.max_items = max_items;
        }
        build
    }

    pub fn build_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.build_timeout_secs)
    }

    pub fn tmdb_api_key(&self) -> Option<&str> {
        self.tmdb_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_iter_defaults() {
        let config: Config = envy::from_iter(Vec::<(String, String)>::new()).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.profile, Profile::GenreTitle);
        assert_eq!(config.build_config(), BuildConfig::default());
        assert!(config.tmdb_api_key().is_none());
        assert!(config.cors_allow_any);
    }

    #[test]
    fn test_cors_can_be_disabled() {
        let config: Config =
            envy::from_iter(vec![("CORS_ALLOW_ANY".to_string(), "false".to_string())]).unwrap();
        assert!(!config.cors_allow_any);
    }

    #[test]
    fn test_overrides_apply_to_profile() {
        let config: Config = envy::from_iter(vec![
            ("PROFILE".to_string(), "cast-crew".to_string()),
            ("WEIGHTING".to_string(), "tfidf".to_string()),
            ("MAX_ITEMS".to_string(), "500".to_string()),
            ("TMDB_API_KEY".to_string(), "  ".to_string()),
        ])
        .unwrap();

        let build = config.build_config();
        assert_eq!(build.profile, Profile::CastCrew);
        assert_eq!(build.weighting, Weighting::Tfidf);
        assert_eq!(build.max_features, Some(5000));
        assert_eq!(build.max_items, 500);
        assert!(config.tmdb_api_key().is_none());
    }
}
