//! Dataset readers for the offline build.
//!
//! Supports MovieLens-style `movies.csv` (`movieId,title,genres`), TMDB-style
//! CSVs carrying JSON-encoded `genres`/`cast`/`crew` columns, and JSON arrays of
//! [`RawRecord`].

use std::io::Read;
use std::path::Path;

use crate::{
    error::{AppError, AppResult},
    models::{ListField, RawRecord},
};

/// Loads records from a `.csv` or `.json` file, preserving file order
pub fn load_records(path: &Path) -> AppResult<Vec<RawRecord>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase);

    let file = std::fs::File::open(path)
        .map_err(|e| AppError::Dataset(format!("Failed to open {}: {}", path.display(), e)))?;

    let records = match extension.as_deref() {
        Some("csv") => read_csv(file)?,
        Some("json") => read_json(file)?,
        _ => {
            return Err(AppError::Dataset(format!(
                "Unsupported dataset format: {}",
                path.display()
            )))
        }
    };

    tracing::info!(
        path = %path.display(),
        record_count = records.len(),
        "Loaded dataset"
    );

    Ok(records)
}

/// Reads a JSON array of records
pub fn read_json<R: Read>(reader: R) -> AppResult<Vec<RawRecord>> {
    serde_json::from_reader(reader)
        .map_err(|e| AppError::Dataset(format!("Failed to parse JSON dataset: {}", e)))
}

/// Reads a CSV with a header row. Columns are matched by name, case-insensitively.
pub fn read_csv<R: Read>(reader: R) -> AppResult<Vec<RawRecord>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::Dataset(format!("Failed to read CSV headers: {}", e)))?
        .clone();

    let column = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };

    let id_col = column(&["movieId", "movie_id", "id"]);
    let title_col = column(&["title"]);
    let genres_col = column(&["genres"]);
    let cast_col = column(&["cast"]);
    let crew_col = column(&["crew"]);

    if title_col.is_none() {
        return Err(AppError::Dataset(
            "CSV dataset has no 'title' column".to_string(),
        ));
    }

    let mut records = Vec::new();
    for (line, row) in reader.records().enumerate() {
        let row = row.map_err(|e| {
            AppError::Dataset(format!("Failed to read CSV row {}: {}", line + 2, e))
        })?;

        let field = |col: Option<usize>| {
            col.and_then(|c| row.get(c))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        records.push(RawRecord {
            id: field(id_col),
            title: field(title_col),
            genres: field(genres_col).map(ListField::Encoded),
            cast: field(cast_col).map(ListField::Encoded),
            crew: field(crew_col).map(ListField::Encoded),
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MOVIELENS: &str = "movieId,title,genres\n\
        1,Toy Story (1995),Adventure|Animation|Children|Comedy|Fantasy\n\
        2,Jumanji (1995),Adventure|Children|Fantasy\n\
        11,\"American President, The (1995)\",Comedy|Drama|Romance\n";

    #[test]
    fn test_read_movielens_csv() {
        let records = read_csv(MOVIELENS.as_bytes()).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].id.as_deref(), Some("1"));
        assert_eq!(
            records[2].title.as_deref(),
            Some("American President, The (1995)")
        );
        assert_eq!(
            records[1].genres,
            Some(ListField::Encoded("Adventure|Children|Fantasy".to_string()))
        );
        assert!(records[0].cast.is_none());
    }

    #[test]
    fn test_read_tmdb_style_csv() {
        let data = "id,title,cast,crew\n\
            19995,Avatar,\"[{\"\"name\"\": \"\"Sam Worthington\"\"}]\",\"[{\"\"name\"\": \"\"James Cameron\"\", \"\"job\"\": \"\"Director\"\"}]\"\n";
        let records = read_csv(data.as_bytes()).unwrap();
        assert_eq!(
            records[0].cast,
            Some(ListField::Encoded(
                r#"[{"name": "Sam Worthington"}]"#.to_string()
            ))
        );
    }

    #[test]
    fn test_csv_without_title_column() {
        let err = read_csv("movieId,genres\n1,Drama\n".as_bytes()).unwrap_err();
        assert!(matches!(err, AppError::Dataset(_)));
    }

    #[test]
    fn test_read_json() {
        let data = r#"[{"movieId": 6, "title": "Heat (1995)", "genres": "Action|Crime"}]"#;
        let records = read_json(data.as_bytes()).unwrap();
        assert_eq!(records[0].id.as_deref(), Some("6"));
    }

    #[test]
    fn test_load_records_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("movies.csv");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(MOVIELENS.as_bytes())
            .unwrap();
        assert_eq!(load_records(&path).unwrap().len(), 3);

        let other = dir.path().join("movies.parquet");
        std::fs::File::create(&other).unwrap();
        assert!(load_records(&other).is_err());
    }
}
