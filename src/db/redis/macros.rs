/// Read-through caching over [`Cache`](crate::db::Cache)
///
/// Evaluates to the cached value for `$key` when there is one. Otherwise awaits
/// `$fut`, returning early with its error, and queues the result to be cached for
/// `$ttl` seconds. The enclosing function must return a `Result` that the
/// future's error converts into.
///
/// ```rust,ignore
/// let summary: String = cached!(cache, key, 3600, generate(&company));
/// ```
#[macro_export]
macro_rules! cached {
    ($cache:expr, $key:expr, $ttl:expr, $fut:expr) => {{
        let key = &$key;
        match $cache.lookup(key).await {
            Some(hit) => hit,
            None => {
                let fresh = $fut.await?;
                let _ = $cache.store_in_background(key, &fresh, $ttl);
                fresh
            }
        }
    }};
}
