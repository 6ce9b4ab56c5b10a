use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::plus::ApiKeyRow;
use crate::models::user::UserIdQuery;
use crate::plus::require_plus;
use crate::state::AppState;

const KEY_PREFIX: &str = "tera_";
const KEY_RANDOM_BYTES: usize = 32;
const MASKED_LEN: usize = 10;
const SUFFIX_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedKey {
    pub full: String,
    pub masked: String,
    pub suffix: String,
}

/// `tera_` followed by 64 hex characters.
pub fn generate_api_key<R: RngCore>(rng: &mut R) -> GeneratedKey {
    let mut bytes = [0u8; KEY_RANDOM_BYTES];
    rng.fill_bytes(&mut bytes);
    let hex: String = bytes.iter().map(|b| format!("{b:02x}")).collect();
    let full = format!("{KEY_PREFIX}{hex}");

    // The key is ASCII, so byte slicing is safe.
    GeneratedKey {
        masked: full[..MASKED_LEN].to_string(),
        suffix: full[full.len() - SUFFIX_LEN..].to_string(),
        full,
    }
}

pub fn hash_api_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyView {
    pub id: Uuid,
    pub masked_key: String,
    pub suffix: String,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
}

impl From<ApiKeyRow> for ApiKeyView {
    fn from(row: ApiKeyRow) -> Self {
        Self {
            id: row.id,
            masked_key: row.masked_key,
            suffix: row.suffix,
            created_at: row.created_at,
            last_used_at: row.last_used_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyRequest {
    pub user_id: Uuid,
}

/// Only response that ever carries the full key.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateApiKeyResponse {
    pub id: Uuid,
    pub full_key: String,
    pub masked_key: String,
    pub suffix: String,
    pub created_at: DateTime<Utc>,
}

/// GET /api/plus/api-keys
pub async fn handle_list_keys(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    require_plus(&state.db, params.user_id).await?;

    let keys: Vec<ApiKeyView> = sqlx::query_as::<_, ApiKeyRow>(
        "SELECT * FROM api_keys WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(params.user_id)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(ApiKeyView::from)
    .collect();

    Ok(Json(json!({ "keys": keys })))
}

/// POST /api/plus/api-keys
pub async fn handle_create_key(
    State(state): State<AppState>,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<Json<CreateApiKeyResponse>, AppError> {
    require_plus(&state.db, req.user_id).await?;

    let key = generate_api_key(&mut rand::thread_rng());
    let row = sqlx::query_as::<_, ApiKeyRow>(
        r#"
        INSERT INTO api_keys (id, user_id, key_hash, masked_key, suffix)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.user_id)
    .bind(hash_api_key(&key.full))
    .bind(&key.masked)
    .bind(&key.suffix)
    .fetch_one(&state.db)
    .await?;

    info!("Issued API key {} for user {}", row.id, req.user_id);
    Ok(Json(CreateApiKeyResponse {
        id: row.id,
        full_key: key.full,
        masked_key: row.masked_key,
        suffix: row.suffix,
        created_at: row.created_at,
    }))
}

/// DELETE /api/plus/api-keys/:id
pub async fn handle_delete_key(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    require_plus(&state.db, params.user_id).await?;

    let result = sqlx::query("DELETE FROM api_keys WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(params.user_id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("API key {id} not found")));
    }

    info!("Revoked API key {id}");
    Ok(Json(json!({ "success": true })))
}
