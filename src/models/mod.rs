use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::Display;

// ============================================================================
// Raw Dataset Types
// ============================================================================

/// A movie record as it arrives from a dataset, before normalization.
///
/// Every field is optional. Structured fields accept either the decoded form or
/// a string that still carries the encoding (e.g. MovieLens `Animation|Comedy`
/// or a TMDB credits column holding a JSON list).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawRecord {
    #[serde(default, alias = "movieId", deserialize_with = "deserialize_raw_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub genres: Option<ListField<Label>>,
    #[serde(default)]
    pub cast: Option<ListField<PersonEntry>>,
    #[serde(default)]
    pub crew: Option<ListField<PersonEntry>>,
}

impl RawRecord {
    /// Creates a record with a title and a delimiter-encoded genre string
    pub fn new(title: impl Into<String>, genres: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            genres: Some(ListField::Encoded(genres.into())),
            ..Default::default()
        }
    }
}

/// A list-valued field that may still be encoded as a string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ListField<T> {
    /// Already-structured list
    Entries(Vec<T>),
    /// Delimited or JSON-encoded text
    Encoded(String),
    /// Anything else; normalizes to an empty list
    Unrecognized(serde_json::Value),
}

/// A genre label, either bare (`"Comedy"`) or TMDB-style (`{"id": 35, "name": "Comedy"}`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Label {
    Plain(String),
    Named { name: String },
    Other(serde_json::Value),
}

/// A cast or crew member entry. Entries that are not objects are skipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PersonEntry {
    Person(Person),
    Other(serde_json::Value),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Person {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub job: Option<String>,
}

impl Person {
    pub fn named(name: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            job: None,
        }
    }

    pub fn with_job(name: &str, job: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            job: Some(job.to_string()),
        }
    }
}

/// MovieLens ids are numeric, TMDB dumps sometimes quote them
fn deserialize_raw_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Number(n)) => Some(n.to_string()),
        Some(RawId::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

// ============================================================================
// Catalogue Types
// ============================================================================

/// A normalized catalogue row. Row order is shared with the feature vectors and
/// the similarity matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Stable key: the dataset id when present, otherwise the display title
    pub key: String,
    #[serde(default)]
    pub id: Option<String>,
    /// Display title, e.g. "Toy Story (1995)"
    pub title: String,
    /// Title with the trailing "(YEAR)" removed; the join key for lookups
    pub canonical_title: String,
    pub year: Option<i32>,
    pub genres: Vec<String>,
    pub tokens: Vec<String>,
}

/// Identifies the item a recommendation query is anchored on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ItemKey {
    /// Canonical ("Toy Story") or display ("Toy Story (1995)") title
    Title(String),
    /// Dataset id
    Id(String),
}

impl Display for ItemKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemKey::Title(title) => write!(f, "{}", title),
            ItemKey::Id(id) => write!(f, "id:{}", id),
        }
    }
}

/// One ranked result returned to the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub year: Option<i32>,
    pub genres: Vec<String>,
    pub score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<PosterRef>,
}

impl Recommendation {
    pub fn from_item(item: &Item, score: f64) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            year: item.year,
            genres: item.genres.clone(),
            score,
            poster: None,
        }
    }
}

/// Image reference for a title, or the agreed placeholder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum PosterRef {
    Url(String),
    Placeholder,
}

// ============================================================================
// Build Configuration Types
// ============================================================================

/// Term weighting used when mapping token bags into vocabulary space
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Weighting {
    /// Raw term counts
    Count,
    /// Term frequency scaled by smoothed inverse document frequency, rows L2-normalized
    Tfidf,
}

/// Preset pipelines for the two kinds of catalogue we ingest
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// Title words and genres, TF-IDF weighted (MovieLens `movies.csv`)
    GenreTitle,
    /// Title words, leading cast and director, count weighted (TMDB credits)
    CastCrew,
}

impl Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::GenreTitle => write!(f, "genre-title"),
            Profile::CastCrew => write!(f, "cast-crew"),
        }
    }
}

impl std::str::FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "genre-title" | "genre_title" => Ok(Profile::GenreTitle),
            "cast-crew" | "cast_crew" => Ok(Profile::CastCrew),
            other => Err(format!("unknown profile '{}'", other)),
        }
    }
}

/// Build-time settings, fixed for the lifetime of one artifact set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BuildConfig {
    pub profile: Profile,
    pub weighting: Weighting,
    /// Vocabulary cap; `None` keeps every token
    pub max_features: Option<usize>,
    /// Leading cast names kept per item
    pub cast_limit: usize,
    /// Crew names kept when no director is credited
    pub crew_fallback_limit: usize,
    /// Whether genre tags join the token bag
    pub include_genres: bool,
    /// Largest catalogue the dense matrix builder accepts
    pub max_items: usize,
}

pub const DEFAULT_MAX_ITEMS: usize = 20_000;

impl BuildConfig {
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::GenreTitle => Self {
                profile,
                weighting: Weighting::Tfidf,
                max_features: None,
                cast_limit: 0,
                crew_fallback_limit: 0,
                include_genres: true,
                max_items: DEFAULT_MAX_ITEMS,
            },
            Profile::CastCrew => Self {
                profile,
                weighting: Weighting::Count,
                max_features: Some(5000),
                cast_limit: 3,
                crew_fallback_limit: 2,
                include_genres: false,
                max_items: DEFAULT_MAX_ITEMS,
            },
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self::for_profile(Profile::GenreTitle)
    }
}

/// Descriptive metadata stored alongside a built artifact set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactManifest {
    pub format_version: u32,
    pub built_at: DateTime<Utc>,
    pub build: BuildConfig,
    pub item_count: usize,
    pub vocabulary_size: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_numeric_id() {
        let record: RawRecord =
            serde_json::from_str(r#"{"movieId": 1, "title": "Toy Story (1995)"}"#).unwrap();
        assert_eq!(record.id, Some("1".to_string()));
        assert_eq!(record.title.as_deref(), Some("Toy Story (1995)"));
    }

    #[test]
    fn test_raw_record_string_genres() {
        let record: RawRecord =
            serde_json::from_str(r#"{"title": "Heat (1995)", "genres": "Action|Crime"}"#).unwrap();
        assert_eq!(
            record.genres,
            Some(ListField::Encoded("Action|Crime".to_string()))
        );
    }

    #[test]
    fn test_raw_record_structured_credits() {
        let record: RawRecord = serde_json::from_str(
            r#"{
                "title": "Avatar",
                "cast": [{"name": "Sam Worthington", "character": "Jake"}, 42],
                "crew": [{"name": "James Cameron", "job": "Director"}]
            }"#,
        )
        .unwrap();

        match record.cast {
            Some(ListField::Entries(entries)) => {
                assert_eq!(entries.len(), 2);
                assert!(matches!(entries[0], PersonEntry::Person(_)));
                assert!(matches!(entries[1], PersonEntry::Other(_)));
            }
            other => panic!("unexpected cast field: {:?}", other),
        }
    }

    #[test]
    fn test_raw_record_unrecognized_field_does_not_fail() {
        let record: RawRecord =
            serde_json::from_str(r#"{"title": "Odd", "genres": 17}"#).unwrap();
        assert!(matches!(record.genres, Some(ListField::Unrecognized(_))));
    }

    #[test]
    fn test_profile_serialization() {
        assert_eq!(
            serde_json::to_string(&Profile::GenreTitle).unwrap(),
            "\"genre-title\""
        );
        assert_eq!("cast_crew".parse::<Profile>().unwrap(), Profile::CastCrew);
        assert!("nope".parse::<Profile>().is_err());
    }

    #[test]
    fn test_poster_ref_serialization() {
        let url = PosterRef::Url("https://image.tmdb.org/t/p/w500/x.jpg".to_string());
        assert_eq!(
            serde_json::to_string(&url).unwrap(),
            r#"{"kind":"url","url":"https://image.tmdb.org/t/p/w500/x.jpg"}"#
        );
        assert_eq!(
            serde_json::to_string(&PosterRef::Placeholder).unwrap(),
            r#"{"kind":"placeholder"}"#
        );
    }

    #[test]
    fn test_item_key_display() {
        assert_eq!(ItemKey::Title("Heat".to_string()).to_string(), "Heat");
        assert_eq!(ItemKey::Id("6".to_string()).to_string(), "id:6");
    }

    #[test]
    fn test_profile_presets() {
        let cast = BuildConfig::for_profile(Profile::CastCrew);
        assert_eq!(cast.weighting, Weighting::Count);
        assert_eq!(cast.max_features, Some(5000));
        assert_eq!(cast.cast_limit, 3);

        let genre = BuildConfig::default();
        assert_eq!(genre.weighting, Weighting::Tfidf);
        assert!(genre.include_genres);
    }
}
