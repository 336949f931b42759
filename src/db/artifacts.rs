//! Artifact persistence.
//!
//! The only contract is an exact round-trip of item order and matrix values.
//! [`FileArtifactStore`] keeps one directory of JSON files. A save writes the
//! whole set into a sibling staging directory and swaps it in with renames, so
//! the directory never mixes files from two builds.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    error::PersistenceError,
    models::{ArtifactManifest, Item},
    services::{artifacts::ArtifactSet, similarity::SimilarityMatrix},
};

const MANIFEST_FILE: &str = "manifest.json";
const ITEMS_FILE: &str = "items.json";
const SIMILARITY_FILE: &str = "similarity.json";

/// Loads and saves built artifact sets
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn load(&self) -> Result<ArtifactSet, PersistenceError>;

    async fn save(&self, set: Arc<ArtifactSet>) -> Result<(), PersistenceError>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// Stores artifacts as JSON files in one directory
#[derive(Debug, Clone)]
pub struct FileArtifactStore {
    dir: PathBuf,
}

/// On-disk shape of the similarity matrix
#[derive(Deserialize)]
struct PackedMatrix {
    n: usize,
    values: Vec<f32>,
}

impl FileArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn io_error(path: &Path, source: std::io::Error) -> PersistenceError {
        PersistenceError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, PersistenceError> {
        let file = File::open(path).map_err(|e| Self::io_error(path, e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| PersistenceError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistenceError> {
        let file = File::create(path).map_err(|e| Self::io_error(path, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, value).map_err(|e| PersistenceError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        writer.flush().map_err(|e| Self::io_error(path, e))
    }

    /// Writes the three artifact files into `dir`, which must exist
    fn write_set(dir: &Path, set: &ArtifactSet) -> Result<(), PersistenceError> {
        Self::write_json(&dir.join(ITEMS_FILE), set.items())?;
        Self::write_json(&dir.join(SIMILARITY_FILE), set.matrix())?;
        Self::write_json(&dir.join(MANIFEST_FILE), set.manifest())
    }

    /// Sibling path `.<name>.<suffix>-<uuid>` next to `dir`
    fn sibling(dir: &Path, suffix: &str) -> Result<PathBuf, PersistenceError> {
        let name = dir.file_name().ok_or_else(|| {
            Self::io_error(
                dir,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "artifact directory has no final path component",
                ),
            )
        })?;

        Ok(dir.with_file_name(format!(
            ".{}.{}-{}",
            name.to_string_lossy(),
            suffix,
            uuid::Uuid::new_v4().simple()
        )))
    }

    fn load_blocking(dir: &Path) -> Result<ArtifactSet, PersistenceError> {
        let manifest_path = dir.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            return Err(PersistenceError::Missing(dir.display().to_string()));
        }

        let manifest: ArtifactManifest = Self::read_json(&manifest_path)?;
        let items: Vec<Item> = Self::read_json(&dir.join(ITEMS_FILE))?;

        let matrix_path = dir.join(SIMILARITY_FILE);
        let packed: PackedMatrix = Self::read_json(&matrix_path)?;
        let matrix = SimilarityMatrix::from_packed(packed.n, packed.values).map_err(|message| {
            PersistenceError::Malformed {
                path: matrix_path.display().to_string(),
                message,
            }
        })?;

        ArtifactSet::new(items, matrix, manifest).map_err(|e| PersistenceError::Malformed {
            path: dir.display().to_string(),
            message: e.to_string(),
        })
    }

    fn save_blocking(dir: &Path, set: &ArtifactSet) -> Result<(), PersistenceError> {
        Self::replace_dir(dir, set, Self::write_set)
    }

    /// Stages a complete set with `write_files`, then renames it over `dir`.
    ///
    /// A failure while staging leaves `dir` untouched. The previous directory is
    /// moved aside before the swap and restored if the swap itself fails.
    fn replace_dir<F>(dir: &Path, set: &ArtifactSet, write_files: F) -> Result<(), PersistenceError>
    where
        F: FnOnce(&Path, &ArtifactSet) -> Result<(), PersistenceError>,
    {
        if let Some(parent) = dir.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Self::io_error(parent, e))?;
        }

        let staging = Self::sibling(dir, "staging")?;
        std::fs::create_dir(&staging).map_err(|e| Self::io_error(&staging, e))?;

        if let Err(e) = write_files(&staging, set) {
            Self::discard(&staging);
            return Err(e);
        }

        let backup = if dir.exists() {
            let backup = Self::sibling(dir, "previous")?;
            if let Err(e) = std::fs::rename(dir, &backup) {
                Self::discard(&staging);
                return Err(Self::io_error(dir, e));
            }
            Some(backup)
        } else {
            None
        };

        if let Err(e) = std::fs::rename(&staging, dir) {
            if let Some(backup) = &backup {
                if let Err(restore) = std::fs::rename(backup, dir) {
                    tracing::error!(
                        error = %restore,
                        backup = %backup.display(),
                        "Failed to restore previous artifacts"
                    );
                }
            }
            Self::discard(&staging);
            return Err(Self::io_error(dir, e));
        }

        if let Some(backup) = backup {
            Self::discard(&backup);
        }

        Ok(())
    }

    fn discard(path: &Path) {
        if let Err(e) = std::fs::remove_dir_all(path) {
            tracing::warn!(error = %e, path = %path.display(), "Failed to remove stale artifact directory");
        }
    }
}

#[async_trait::async_trait]
impl ArtifactStore for FileArtifactStore {
    async fn load(&self) -> Result<ArtifactSet, PersistenceError> {
        let dir = self.dir.clone();
        let set = tokio::task::spawn_blocking(move || Self::load_blocking(&dir))
            .await
            .map_err(|e| Self::io_error(&self.dir, std::io::Error::other(e.to_string())))??;

        tracing::info!(
            location = %self.location(),
            item_count = set.len(),
            "Loaded artifacts"
        );

        Ok(set)
    }

    async fn save(&self, set: Arc<ArtifactSet>) -> Result<(), PersistenceError> {
        let dir = self.dir.clone();
        let item_count = set.len();
        tokio::task::spawn_blocking(move || Self::save_blocking(&dir, &set))
            .await
            .map_err(|e| Self::io_error(&self.dir, std::io::Error::other(e.to_string())))??;

        tracing::info!(
            location = %self.location(),
            item_count,
            "Saved artifacts"
        );

        Ok(())
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BuildConfig, RawRecord};
    use crate::services::artifacts::build;

    fn set_of(titles: &[(&str, &str)]) -> Arc<ArtifactSet> {
        let records: Vec<RawRecord> = titles
            .iter()
            .map(|(title, genres)| RawRecord::new(*title, *genres))
            .collect();
        Arc::new(
            build(&records, &BuildConfig::default())
                .unwrap()
                .into_artifacts()
                .unwrap(),
        )
    }

    fn built() -> Arc<ArtifactSet> {
        let records = vec![
            RawRecord::new("Toy Story (1995)", "Adventure|Animation|Children|Comedy|Fantasy"),
            RawRecord::new("Jumanji (1995)", "Adventure|Children|Fantasy"),
            RawRecord::new("Grumpier Old Men (1995)", "Comedy|Romance"),
            RawRecord::new("Heat (1995)", "Action|Crime|Thriller"),
            RawRecord {
                title: Some("(2001)".to_string()),
                ..Default::default()
            },
        ];
        Arc::new(
            build(&records, &BuildConfig::default())
                .unwrap()
                .into_artifacts()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_round_trip_preserves_order_and_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path().join("artifacts"));
        let original = built();

        store.save(original.clone()).await.unwrap();
        let loaded = store.load().await.unwrap();

        assert_eq!(loaded.items(), original.items());
        assert_eq!(loaded.matrix(), original.matrix());
        assert_eq!(loaded.manifest(), original.manifest());
    }

    #[tokio::test]
    async fn test_load_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path().join("nothing-here"));
        assert!(matches!(
            store.load().await,
            Err(PersistenceError::Missing(_))
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_wrong_matrix_shape() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store.save(built()).await.unwrap();

        std::fs::write(
            dir.path().join(SIMILARITY_FILE),
            r#"{"n": 5, "values": [1.0, 0.5]}"#,
        )
        .unwrap();

        assert!(matches!(
            store.load().await,
            Err(PersistenceError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_items_matrix_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileArtifactStore::new(dir.path());
        store.save(built()).await.unwrap();

        std::fs::write(dir.path().join(ITEMS_FILE), "[]").unwrap();

        assert!(matches!(
            store.load().await,
            Err(PersistenceError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn test_interrupted_save_keeps_previous_set() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = dir.path().join("artifacts");
        let store = FileArtifactStore::new(&artifacts);

        let first = set_of(&[
            ("Toy Story (1995)", "Animation|Comedy"),
            ("Toy Story 2 (1999)", "Animation|Comedy"),
            ("Heat (1995)", "Action|Crime"),
        ]);
        store.save(first.clone()).await.unwrap();

        let second = set_of(&[
            ("Heat (1995)", "Action|Crime"),
            ("Casino (1995)", "Crime|Drama"),
            ("Balto (1995)", "Adventure|Animation|Children"),
        ]);

        // Items land in staging, then the matrix write fails
        let result = FileArtifactStore::replace_dir(&artifacts, &second, |staging, set| {
            FileArtifactStore::write_json(&staging.join(ITEMS_FILE), set.items())?;
            Err(FileArtifactStore::io_error(
                &staging.join(SIMILARITY_FILE),
                std::io::Error::other("disk full"),
            ))
        });
        assert!(matches!(result, Err(PersistenceError::Io { .. })));

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.items(), first.items());
        assert_eq!(loaded.matrix(), first.matrix());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("artifacts")]);
    }

    #[tokio::test]
    async fn test_save_replaces_previous_set() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = dir.path().join("artifacts");
        let store = FileArtifactStore::new(&artifacts);

        store.save(built()).await.unwrap();
        let second = set_of(&[
            ("Heat (1995)", "Action|Crime"),
            ("Casino (1995)", "Crime|Drama"),
        ]);
        store.save(second.clone()).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.items(), second.items());
        assert_eq!(loaded.matrix(), second.matrix());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
