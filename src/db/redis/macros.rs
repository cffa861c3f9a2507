/// Read-through caching around an async computation.
///
/// Looks `$key` up in `$cache`; on a hit the cached value is returned. On a
/// miss (or when the cache is unavailable) `$block` is awaited, its value is
/// queued for writing with `$ttl` seconds to live, and then returned. Errors
/// from `$block` propagate with `?` and are never cached.
///
/// # Example
/// ```rust,ignore
/// let vector: AppResult<Vec<f32>> = cached!(self.cache, key, 3600, async move {
///     self.inner.embed(text).await
/// });
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $block:expr) => {{
        if let Some(cached) = $cache.lookup(&$key).await {
            Ok(cached)
        } else {
            let value = $block.await?;
            $cache.set_in_background(&$key, &value, $ttl);
            Ok(value)
        }
    }};
}
