use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::learning::{SearchBookmarkRow, SearchHistoryRow};
use crate::models::user::UserIdQuery;
use crate::search::cached_search;
use crate::search::client::{SearchQuery, SearchResult};
use crate::search::history::{
    clear_history, delete_bookmark, list_bookmarks, list_history, list_limit, normalize_tags,
    record_search, upsert_bookmark, validate_bookmark_url, NewBookmark, DEFAULT_BOOKMARK_LIMIT,
    DEFAULT_HISTORY_LIMIT,
};
use crate::state::AppState;
use crate::usage::web_search::{consume_web_search, limit_message, web_search_remaining};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchRequest {
    pub user_id: Uuid,
    pub query: String,
    pub limit: Option<u32>,
    pub lang: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WebSearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub provider: &'static str,
    pub cached: bool,
    pub remaining: u32,
    pub total: u32,
    pub message: String,
}

/// POST /api/search/web
///
/// Every successful search counts against the monthly quota, including
/// searches answered from the cache.
pub async fn handle_web_search(
    State(state): State<AppState>,
    Json(req): Json<WebSearchRequest>,
) -> Result<Json<WebSearchResponse>, AppError> {
    let query = SearchQuery::new(&req.query, req.limit, req.lang.as_deref());
    if query.query.is_empty() {
        return Err(AppError::Validation("query cannot be empty".to_string()));
    }

    let quota = web_search_remaining(&state.db, req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if quota.remaining == 0 {
        return Err(AppError::LimitReached {
            message: limit_message(0, quota.total),
            remaining: 0,
            total: quota.total,
            reset_date: quota.reset_date,
        });
    }

    let (results, cached) = cached_search(&state, &query)
        .await
        .map_err(|_| AppError::Upstream("Web search is unavailable right now".to_string()))?;

    let counted = consume_web_search(&state.db, req.user_id).await?;
    let remaining = if counted {
        quota.remaining - 1
    } else {
        quota.remaining
    };

    info!(
        "Web search for user {}: {} results (cached: {cached})",
        req.user_id,
        results.len()
    );

    let filters = json!({ "lang": query.lang, "limit": query.limit });
    if let Err(e) = record_search(&state.db, req.user_id, &query.query, results.len(), filters).await {
        warn!("Failed to record search history for user {}: {e}", req.user_id);
    }

    Ok(Json(WebSearchResponse {
        query: query.query,
        results,
        provider: state.search.name(),
        cached,
        remaining,
        total: quota.total,
        message: limit_message(remaining, quota.total),
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    pub user_id: Uuid,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub history: Vec<SearchHistoryRow>,
}

/// GET /api/search/history
pub async fn handle_list_history(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let limit = list_limit(params.limit, DEFAULT_HISTORY_LIMIT);
    let history = list_history(&state.db, params.user_id, limit).await?;
    Ok(Json(HistoryResponse { history }))
}

/// DELETE /api/search/history
pub async fn handle_clear_history(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    let removed = clear_history(&state.db, params.user_id).await?;
    info!("Cleared {removed} search history entries for user {}", params.user_id);
    Ok(Json(json!({ "success": true, "removed": removed })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkRequest {
    pub user_id: Uuid,
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
    pub source: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkListQuery {
    pub user_id: Uuid,
    pub limit: Option<i64>,
    /// Only the bookmark for this page, to tell whether it is saved.
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookmarksResponse {
    pub bookmarks: Vec<SearchBookmarkRow>,
}

/// POST /api/search/bookmarks
pub async fn handle_save_bookmark(
    State(state): State<AppState>,
    Json(req): Json<BookmarkRequest>,
) -> Result<Json<SearchBookmarkRow>, AppError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }
    let url = validate_bookmark_url(&req.url)?;

    let bookmark = upsert_bookmark(
        &state.db,
        NewBookmark {
            user_id: req.user_id,
            title,
            url: &url,
            snippet: req.snippet.as_deref(),
            source: req.source.as_deref(),
            notes: req.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()),
            tags: normalize_tags(&req.tags),
        },
    )
    .await?;
    info!("Saved bookmark {} for user {}", bookmark.id, req.user_id);
    Ok(Json(bookmark))
}

/// GET /api/search/bookmarks
pub async fn handle_list_bookmarks(
    State(state): State<AppState>,
    Query(params): Query<BookmarkListQuery>,
) -> Result<Json<BookmarksResponse>, AppError> {
    let url = params.url.as_deref().map(validate_bookmark_url).transpose()?;
    let limit = list_limit(params.limit, DEFAULT_BOOKMARK_LIMIT);
    let bookmarks = list_bookmarks(&state.db, params.user_id, url.as_deref(), limit).await?;
    Ok(Json(BookmarksResponse { bookmarks }))
}

/// DELETE /api/search/bookmarks/:id
pub async fn handle_delete_bookmark(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    if !delete_bookmark(&state.db, params.user_id, id).await? {
        return Err(AppError::NotFound(format!("Bookmark {id} not found")));
    }
    Ok(Json(json!({ "success": true })))
}
