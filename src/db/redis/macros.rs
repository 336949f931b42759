/// Read-through caching around an async computation.
///
/// This macro checks if a value is present in the cache.
/// If found, it returns the cached value.
/// If not found, or if the cache cannot be read, it awaits the provided block
/// to compute the value, queues it for a background write, and returns it.
/// An unreachable cache therefore costs a log line, never the result.
///
/// # Arguments
/// * `$cache`: The cache instance to use. It must have `get_from_cache` and
///   `set_in_background` methods.
/// * `$key`: The key to use for caching the value.
/// * `$ttl`: The time-to-live (TTL) for the cached value in seconds.
/// * `$block`: The future to await if the value is not cached. Evaluates to an `AppResult`.
///
/// # Example
/// ```rust,ignore
/// let poster = cached!(cache, CacheKey::Poster(title, year), 3600, fetch(title, year))?;
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        let key = $key;
        let hit = match $cache.get_from_cache(&key).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(error = %e, key = %key, "Cache read failed; treating as a miss");
                None
            }
        };

        match hit {
            Some(cached) => Ok(cached),
            None => {
                let value = $block.await?;
                $cache.set_in_background(&key, &value, $ttl);
                Ok(value)
            }
        }
    }};
}
