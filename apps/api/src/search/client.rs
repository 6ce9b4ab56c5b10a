//! Web search backends.
//!
//! `AppState` holds an `Arc<dyn SearchProvider>`; the default backend is a
//! SearXNG instance queried through its JSON API.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const SEARCH_TIMEOUT_SECS: u64 = 5;
pub const MAX_RESULTS: u32 = 10;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("search backend returned status {0}")]
    Status(u16),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: String,
    pub favicon: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub query: String,
    pub limit: u32,
    pub lang: String,
}

impl SearchQuery {
    /// Trims the query and clamps the limit to `1..=MAX_RESULTS`.
    pub fn new(query: &str, limit: Option<u32>, lang: Option<&str>) -> Self {
        Self {
            query: query.trim().to_string(),
            limit: limit.unwrap_or(MAX_RESULTS).clamp(1, MAX_RESULTS),
            lang: lang
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .unwrap_or("en")
                .to_string(),
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError>;
}

pub struct SearxngProvider {
    client: Client,
    base_url: String,
}

impl SearxngProvider {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SEARCH_TIMEOUT_SECS))
            .build()
            .context("Failed to build search HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    content: Option<String>,
    engine: Option<String>,
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    fn name(&self) -> &'static str {
        "searxng"
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchResult>, SearchError> {
        let limit = query.limit.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", query.query.as_str()),
                ("format", "json"),
                ("language", query.lang.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let body: SearxngResponse = response.json().await?;
        let results: Vec<SearchResult> = body
            .results
            .into_iter()
            .filter(|r| !r.url.is_empty())
            .take(query.limit as usize)
            .map(to_search_result)
            .collect();

        debug!("SearXNG returned {} results for {:?}", results.len(), query.query);
        Ok(results)
    }
}

fn to_search_result(raw: SearxngResult) -> SearchResult {
    let domain = extract_domain(&raw.url);
    SearchResult {
        title: raw.title,
        snippet: raw.content.unwrap_or_default(),
        source: raw.engine.filter(|e| !e.is_empty()).unwrap_or_else(|| domain.clone()),
        favicon: Some(format!(
            "https://www.google.com/s2/favicons?domain={domain}&sz=32"
        )),
        url: raw.url,
    }
}

/// Host name without a leading `www.`; the input itself when it is not a URL.
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_clamps_limit() {
        assert_eq!(SearchQuery::new("x", Some(0), None).limit, 1);
        assert_eq!(SearchQuery::new("x", Some(50), None).limit, 10);
        assert_eq!(SearchQuery::new("x", None, None).limit, 10);
        assert_eq!(SearchQuery::new("x", Some(4), None).limit, 4);
    }

    #[test]
    fn test_query_trims_and_defaults_lang() {
        let q = SearchQuery::new("  cells  ", None, Some(" "));
        assert_eq!(q.query, "cells");
        assert_eq!(q.lang, "en");
        assert_eq!(SearchQuery::new("x", None, Some("fr")).lang, "fr");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("https://www.nasa.gov/moon"), "nasa.gov");
        assert_eq!(extract_domain("not a url"), "not a url");
    }

    #[test]
    fn test_result_mapping() {
        let raw: SearxngResult = serde_json::from_value(serde_json::json!({
            "title": "Moon",
            "url": "https://www.nasa.gov/moon",
            "content": "Earth's satellite"
        }))
        .unwrap();
        let r = to_search_result(raw);
        assert_eq!(r.snippet, "Earth's satellite");
        assert_eq!(r.source, "nasa.gov");
        assert!(r.favicon.unwrap().contains("domain=nasa.gov"));
    }

    #[test]
    fn test_engine_preferred_as_source() {
        let raw: SearxngResult = serde_json::from_value(serde_json::json!({
            "title": "Moon",
            "url": "https://nasa.gov",
            "engine": "duckduckgo"
        }))
        .unwrap();
        assert_eq!(to_search_result(raw).source, "duckduckgo");
    }
}
