use std::sync::Arc;

use aws_sdk_s3::Client as S3Client;
use sqlx::PgPool;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::search::cache::SearchCache;
use crate::search::client::SearchProvider;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub s3: S3Client,
    pub llm: LlmClient,
    pub config: Config,
    /// Web search backend. Default: SearXNG.
    pub search: Arc<dyn SearchProvider>,
    /// Redis-backed cache in front of `search`.
    pub search_cache: SearchCache,
}
