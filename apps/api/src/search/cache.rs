//! Redis cache for web search results.
//!
//! Cache failures never fail a search: reads fall through to the provider and
//! writes are dropped, both with a warning.

use redis::{AsyncCommands, Client as RedisClient};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::search::client::{SearchQuery, SearchResult};

#[derive(Clone)]
pub struct SearchCache {
    redis: RedisClient,
    ttl_secs: u64,
}

impl SearchCache {
    pub fn new(redis: RedisClient, ttl_secs: u64) -> Self {
        Self { redis, ttl_secs }
    }

    pub async fn get(&self, query: &SearchQuery) -> Option<Vec<SearchResult>> {
        let key = cache_key(query);
        let mut conn = match self.redis.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("Redis unavailable for search cache read: {e}");
                return None;
            }
        };

        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(data)) => match serde_json::from_str(&data) {
                Ok(results) => {
                    debug!("Search cache hit for {key}");
                    Some(results)
                }
                Err(e) => {
                    warn!("Discarding unreadable cached search {key}: {e}");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("Redis error reading search cache: {e}");
                None
            }
        }
    }

    pub async fn put(&self, query: &SearchQuery, results: &[SearchResult]) {
        if self.ttl_secs == 0 {
            return;
        }
        let key = cache_key(query);
        let serialized = match serde_json::to_string(results) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize search results for cache: {e}");
                return;
            }
        };

        let mut conn = match self.redis.get_multiplexed_async_connection().await {
            Ok(c) => c,
            Err(e) => {
                warn!("Redis unavailable for search cache write: {e}");
                return;
            }
        };

        let stored: redis::RedisResult<()> = conn.set_ex(&key, serialized, self.ttl_secs).await;
        if let Err(e) = stored {
            warn!("Redis error writing search cache: {e}");
        }
    }
}

/// `search:<sha256 of lang, limit and lower-cased query>`
pub fn cache_key(query: &SearchQuery) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.lang.as_bytes());
    hasher.update([0u8]);
    hasher.update(query.limit.to_be_bytes());
    hasher.update([0u8]);
    hasher.update(query.query.to_lowercase().as_bytes());
    format!("search:{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_case_insensitive() {
        let a = SearchQuery::new("Photosynthesis", Some(5), None);
        let b = SearchQuery::new("photosynthesis ", Some(5), None);
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn test_cache_key_varies_with_limit_and_lang() {
        let base = SearchQuery::new("moon", Some(5), None);
        let more = SearchQuery::new("moon", Some(6), None);
        let french = SearchQuery::new("moon", Some(5), Some("fr"));
        assert_ne!(cache_key(&base), cache_key(&more));
        assert_ne!(cache_key(&base), cache_key(&french));
        assert!(cache_key(&base).starts_with("search:"));
    }
}
