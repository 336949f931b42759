//! The artifact triple and the offline build pass that produces it.

use std::collections::HashMap;

use chrono::Utc;

use crate::error::BuildError;
use crate::models::{ArtifactManifest, BuildConfig, Item, ItemKey, RawRecord};
use crate::services::normalizer;
use crate::services::similarity::SimilarityMatrix;
use crate::services::vectorizer::{FeatureVector, FeatureVectorizer};

pub const FORMAT_VERSION: u32 = 1;

/// Everything one build pass produces, vectors included
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub items: Vec<Item>,
    pub vectorizer: FeatureVectorizer,
    pub vectors: Vec<FeatureVector>,
    pub matrix: SimilarityMatrix,
    pub manifest: ArtifactManifest,
}

impl BuildOutput {
    /// Drops the vectors, keeping what queries need
    pub fn into_artifacts(self) -> Result<ArtifactSet, BuildError> {
        ArtifactSet::new(self.items, self.matrix, self.manifest)
    }
}

/// Runs normalize → vectorize → similarity in one synchronous pass.
///
/// Nothing is returned unless every stage succeeds.
pub fn build(records: &[RawRecord], config: &BuildConfig) -> Result<BuildOutput, BuildError> {
    if records.is_empty() {
        return Err(BuildError::EmptyCorpus);
    }
    if records.len() > config.max_items {
        return Err(BuildError::TooLarge {
            items: records.len(),
            max: config.max_items,
        });
    }

    let items = normalizer::normalize_all(records, config);
    let vectorizer = FeatureVectorizer::fit(&items, config.weighting, config.max_features);
    let vectors = vectorizer.transform_all(&items);

    if vectors.len() != items.len() {
        return Err(BuildError::Misaligned(format!(
            "{} vectors for {} items",
            vectors.len(),
            items.len()
        )));
    }

    let matrix = SimilarityMatrix::build(&vectors, config.max_items)?;

    let empty_bags = vectors.iter().filter(|v| v.is_zero()).count();
    tracing::info!(
        item_count = items.len(),
        vocabulary_size = vectorizer.dim(),
        weighting = ?vectorizer.weighting(),
        empty_bags,
        profile = %config.profile,
        "Build pass completed"
    );

    let manifest = ArtifactManifest {
        format_version: FORMAT_VERSION,
        built_at: Utc::now(),
        build: config.clone(),
        item_count: items.len(),
        vocabulary_size: vectorizer.dim(),
    };

    Ok(BuildOutput {
        items,
        vectorizer,
        vectors,
        matrix,
        manifest,
    })
}

/// Items and similarity matrix served together, plus lookup indexes.
///
/// Read-only once constructed; a rebuild makes a new set.
#[derive(Debug)]
pub struct ArtifactSet {
    items: Vec<Item>,
    matrix: SimilarityMatrix,
    manifest: ArtifactManifest,
    by_id: HashMap<String, usize>,
    by_canonical_title: HashMap<String, usize>,
    by_title: HashMap<String, usize>,
}

impl ArtifactSet {
    /// Pairs items with their matrix. The first row wins when keys collide.
    pub fn new(
        items: Vec<Item>,
        matrix: SimilarityMatrix,
        manifest: ArtifactManifest,
    ) -> Result<Self, BuildError> {
        if items.len() != matrix.len() {
            return Err(BuildError::Misaligned(format!(
                "{} items but matrix has {} rows",
                items.len(),
                matrix.len()
            )));
        }

        let mut by_id = HashMap::new();
        let mut by_canonical_title = HashMap::new();
        let mut by_title = HashMap::new();

        for (row, item) in items.iter().enumerate() {
            if let Some(id) = &item.id {
                by_id.entry(id.clone()).or_insert(row);
            }
            by_canonical_title
                .entry(item.canonical_title.clone())
                .or_insert(row);
            by_title.entry(item.title.clone()).or_insert(row);
        }

        Ok(Self {
            items,
            matrix,
            manifest,
            by_id,
            by_canonical_title,
            by_title,
        })
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn matrix(&self) -> &SimilarityMatrix {
        &self.matrix
    }

    pub fn manifest(&self) -> &ArtifactManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Row index for a key. Titles match the canonical title first, then the display title.
    pub fn resolve(&self, key: &ItemKey) -> Option<usize> {
        match key {
            ItemKey::Id(id) => self.by_id.get(id.trim()).copied(),
            ItemKey::Title(title) => {
                let title = title.trim();
                self.by_canonical_title
                    .get(title)
                    .or_else(|| self.by_title.get(title))
                    .copied()
            }
        }
    }
}
