pub mod cache;
pub mod client;
pub mod handlers;
pub mod history;

use tracing::warn;

use crate::search::client::{SearchError, SearchQuery, SearchResult};
use crate::state::AppState;

/// Cache first, then the provider. The flag tells whether the results came
/// from the cache.
pub async fn cached_search(
    state: &AppState,
    query: &SearchQuery,
) -> Result<(Vec<SearchResult>, bool), SearchError> {
    if let Some(results) = state.search_cache.get(query).await {
        return Ok((results, true));
    }
    let results = state.search.search(query).await.inspect_err(|e| {
        warn!("{} search failed for {:?}: {e}", state.search.name(), query.query);
    })?;
    state.search_cache.put(query, &results).await;
    Ok((results, false))
}
