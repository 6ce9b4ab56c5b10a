//! Per-user search history and bookmarked results.

use anyhow::Result;
use reqwest::Url;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::learning::{SearchBookmarkRow, SearchHistoryRow};

pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
pub const DEFAULT_BOOKMARK_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 100;
const MAX_TAGS: usize = 20;

/// Requested page size, defaulted and clamped to `1..=100`.
pub fn list_limit(requested: Option<i64>, default: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, MAX_LIST_LIMIT)
}

/// Trimmed, de-duplicated, non-empty tags in first-seen order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !out.iter().any(|seen| seen.eq_ignore_ascii_case(tag)) {
            out.push(tag.to_string());
        }
    }
    out.truncate(MAX_TAGS);
    out
}

/// Bookmarks must point at a web page.
pub fn validate_bookmark_url(raw: &str) -> Result<String, AppError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| AppError::Validation(format!("Invalid bookmark URL: {raw}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AppError::Validation(
            "Bookmark URL must use http or https".to_string(),
        ));
    }
    Ok(url.to_string())
}

pub async fn record_search(
    pool: &PgPool,
    user_id: Uuid,
    query: &str,
    result_count: usize,
    filters: Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO search_history (id, user_id, query, result_count, filters)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(query)
    .bind(result_count as i32)
    .bind(filters)
    .execute(pool)
    .await?;
    Ok(())
}

/// Newest first.
pub async fn list_history(pool: &PgPool, user_id: Uuid, limit: i64) -> Result<Vec<SearchHistoryRow>> {
    Ok(sqlx::query_as::<_, SearchHistoryRow>(
        r#"
        SELECT * FROM search_history
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Returns the number of entries removed.
pub async fn clear_history(pool: &PgPool, user_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM search_history WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub struct NewBookmark<'a> {
    pub user_id: Uuid,
    pub title: &'a str,
    pub url: &'a str,
    pub snippet: Option<&'a str>,
    pub source: Option<&'a str>,
    pub notes: Option<&'a str>,
    pub tags: Vec<String>,
}

/// Saving the same URL twice updates the existing bookmark.
pub async fn upsert_bookmark(pool: &PgPool, bookmark: NewBookmark<'_>) -> Result<SearchBookmarkRow> {
    Ok(sqlx::query_as::<_, SearchBookmarkRow>(
        r#"
        INSERT INTO search_bookmarks (id, user_id, title, url, snippet, source, notes, tags)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id, url) DO UPDATE
        SET title = EXCLUDED.title,
            snippet = EXCLUDED.snippet,
            source = EXCLUDED.source,
            notes = EXCLUDED.notes,
            tags = EXCLUDED.tags
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(bookmark.user_id)
    .bind(bookmark.title)
    .bind(bookmark.url)
    .bind(bookmark.snippet)
    .bind(bookmark.source)
    .bind(bookmark.notes)
    .bind(&bookmark.tags)
    .fetch_one(pool)
    .await?)
}

/// Newest first. With `url`, returns at most the bookmark for that page.
pub async fn list_bookmarks(
    pool: &PgPool,
    user_id: Uuid,
    url: Option<&str>,
    limit: i64,
) -> Result<Vec<SearchBookmarkRow>> {
    Ok(sqlx::query_as::<_, SearchBookmarkRow>(
        r#"
        SELECT * FROM search_bookmarks
        WHERE user_id = $1 AND ($2::text IS NULL OR url = $2)
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(url)
    .bind(limit)
    .fetch_all(pool)
    .await?)
}

/// Returns false if the bookmark does not exist or belongs to someone else.
pub async fn delete_bookmark(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM search_bookmarks WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_limit_defaults_and_clamps() {
        assert_eq!(list_limit(None, DEFAULT_HISTORY_LIMIT), 20);
        assert_eq!(list_limit(None, DEFAULT_BOOKMARK_LIMIT), 50);
        assert_eq!(list_limit(Some(0), DEFAULT_HISTORY_LIMIT), 1);
        assert_eq!(list_limit(Some(5000), DEFAULT_HISTORY_LIMIT), 100);
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " biology ".to_string(),
            "".to_string(),
            "Biology".to_string(),
            "exam".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["biology", "exam"]);
    }

    #[test]
    fn test_bookmark_url_must_be_web() {
        assert_eq!(
            validate_bookmark_url(" https://example.com/a ").unwrap(),
            "https://example.com/a"
        );
        assert!(matches!(
            validate_bookmark_url("javascript:alert(1)"),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(validate_bookmark_url("not a url"), Err(AppError::Validation(_))));
    }
}
