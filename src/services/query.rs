use crate::{
    error::{AppError, AppResult},
    models::{ItemKey, Recommendation},
    services::artifacts::ArtifactSet,
};

/// Ranks every other item by similarity to `key` and returns the first `top_k`.
///
/// Ties keep row order. The query item itself is never returned. Fewer than
/// `top_k` results is not an error.
pub fn recommend(set: &ArtifactSet, key: &ItemKey, top_k: usize) -> AppResult<Vec<Recommendation>> {
    if top_k == 0 {
        return Err(AppError::InvalidInput(
            "top_k must be at least 1".to_string(),
        ));
    }

    let row = set
        .resolve(key)
        .ok_or_else(|| AppError::NotFound(format!("No movie matches '{}'", key)))?;

    let mut scored: Vec<(usize, f32)> = set
        .matrix()
        .row(row)
        .enumerate()
        .filter(|(other, _)| *other != row)
        .collect();

    // sort_by is stable, so equal scores stay in row order
    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(top_k);

    let items = set.items();
    Ok(scored
        .into_iter()
        .map(|(other, score)| Recommendation::from_item(&items[other], f64::from(score)))
        .collect())
}

/// Display titles containing `query`, case-insensitively, in row order.
/// An empty query lists the first `limit` titles.
pub fn suggest(set: &ArtifactSet, query: &str, limit: usize) -> Vec<String> {
    let needle = query.trim().to_lowercase();
    set.items()
        .iter()
        .filter(|item| needle.is_empty() || item.title.to_lowercase().contains(&needle))
        .take(limit)
        .map(|item| item.title.clone())
        .collect()
}
