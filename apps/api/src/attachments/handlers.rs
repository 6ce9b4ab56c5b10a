use aws_sdk_s3::primitives::ByteStream;
use axum::{
    extract::{multipart::Field, Multipart, Query, State},
    Json,
};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::attachments::{extract_text, file_extension, storage_key, AttachmentType};
use crate::errors::AppError;
use crate::state::AppState;
use crate::usage::counters::{ensure_can_upload, increment_file_uploads};
use crate::usage::plans::{plan_config, PlanType};

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentResponse {
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub kind: AttachmentType,
    pub size: u64,
    pub extracted_text: String,
}

struct UploadForm {
    user_id: Uuid,
    kind: AttachmentType,
    file_name: String,
    content_type: Option<String>,
    data: Bytes,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub user_id: Option<Uuid>,
}

/// Bytes accepted so far for one upload, capped by the plan's file size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct UploadBudget {
    max_mb: u64,
    received: u64,
}

impl UploadBudget {
    fn for_plan(plan: PlanType) -> Self {
        Self {
            max_mb: plan_config(plan).limits.max_file_size_mb,
            received: 0,
        }
    }

    fn max_bytes(&self) -> u64 {
        self.max_mb * BYTES_PER_MB
    }

    /// Accounts for the next chunk, failing as soon as the limit is passed.
    fn take(&mut self, len: usize) -> Result<(), AppError> {
        self.received += len as u64;
        if self.received > self.max_bytes() {
            return Err(AppError::Validation(format!(
                "File exceeds the {} MB limit for your plan",
                self.max_mb
            )));
        }
        Ok(())
    }
}

/// A user cleared to upload. Opened before any file bytes are read.
struct UploadGate {
    user_id: Uuid,
    budget: UploadBudget,
}

async fn open_gate(pool: &PgPool, user_id: Uuid) -> Result<UploadGate, AppError> {
    let counters = ensure_can_upload(pool, user_id).await?;
    Ok(UploadGate {
        user_id,
        budget: UploadBudget::for_plan(counters.plan),
    })
}

/// POST /api/attachments
///
/// Multipart fields: `userId`, `type` (`file` or `image`) and `file`. The
/// user is given either as `?userId=` or as a field preceding `file`, so
/// quota and size limits apply while the file streams in.
pub async fn handle_upload(
    State(state): State<AppState>,
    Query(params): Query<UploadQuery>,
    multipart: Multipart,
) -> Result<Json<AttachmentResponse>, AppError> {
    let form = read_form(&state.db, params.user_id, multipart).await?;
    let size = form.data.len() as u64;

    let ext = file_extension(&form.file_name);
    let key = storage_key(form.kind, Uuid::new_v4(), ext.as_deref());

    let mut put = state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(&key)
        .body(ByteStream::from(form.data.clone()));
    if let Some(content_type) = &form.content_type {
        put = put.content_type(content_type);
    }
    put.send()
        .await
        .map_err(|e| AppError::Storage(format!("attachment upload failed: {e}")))?;

    // pdf-extract is CPU-bound and can panic on malformed documents.
    let data = form.data;
    let extracted_text = tokio::task::spawn_blocking(move || extract_text(ext.as_deref(), &data))
        .await
        .unwrap_or_else(|e| {
            warn!("Text extraction for {key} aborted: {e}");
            String::new()
        });

    increment_file_uploads(&state.db, form.user_id, 1).await?;
    info!(
        "Stored attachment {} ({size} bytes) for user {}",
        key, form.user_id
    );

    Ok(Json(AttachmentResponse {
        name: form.file_name,
        key,
        kind: form.kind,
        size,
        extracted_text,
    }))
}

async fn read_form(
    pool: &PgPool,
    query_user: Option<Uuid>,
    mut multipart: Multipart,
) -> Result<UploadForm, AppError> {
    let mut gate = match query_user {
        Some(user_id) => Some(open_gate(pool, user_id).await?),
        None => None,
    };
    let mut kind = AttachmentType::File;
    let mut file = None;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "userId" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable userId: {e}")))?;
                let user_id = Uuid::parse_str(text.trim())
                    .map_err(|_| AppError::Validation("userId must be a UUID".to_string()))?;
                match gate.as_ref().map(|open| open.user_id) {
                    Some(gated) if gated != user_id => {
                        return Err(AppError::Validation(
                            "userId field does not match the userId query parameter".to_string(),
                        ));
                    }
                    Some(_) => {}
                    None => gate = Some(open_gate(pool, user_id).await?),
                }
            }
            "type" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Unreadable type: {e}")))?;
                kind = AttachmentType::parse(&text).ok_or_else(|| {
                    AppError::Validation(format!("Unsupported attachment type: {text}"))
                })?;
            }
            "file" => {
                let Some(open) = gate.as_mut() else {
                    return Err(AppError::Validation(
                        "userId must be sent before file".to_string(),
                    ));
                };
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let content_type = field.content_type().map(str::to_string);
                let data = read_file(&mut field, &mut open.budget).await?;
                file = Some((file_name, content_type, data));
            }
            _ => {}
        }
    }

    let gate = gate.ok_or_else(|| AppError::Validation("userId is required".to_string()))?;
    let (file_name, content_type, data) =
        file.ok_or_else(|| AppError::Validation("No file provided".to_string()))?;

    Ok(UploadForm {
        user_id: gate.user_id,
        kind,
        file_name,
        content_type,
        data,
    })
}

/// Streams a file field into memory, stopping at the first chunk that
/// passes the budget.
async fn read_file(field: &mut Field<'_>, budget: &mut UploadBudget) -> Result<Bytes, AppError> {
    let mut data = BytesMut::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::Validation(format!("Unreadable file: {e}")))?
    {
        budget.take(chunk.len())?;
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_follows_plan() {
        assert_eq!(UploadBudget::for_plan(PlanType::Free).max_bytes(), 25 * BYTES_PER_MB);
        assert_eq!(UploadBudget::for_plan(PlanType::Plus).max_bytes(), 2000 * BYTES_PER_MB);
    }

    #[test]
    fn test_budget_accepts_up_to_limit() {
        let mut budget = UploadBudget::for_plan(PlanType::Free);
        let chunk = BYTES_PER_MB as usize;
        for _ in 0..25 {
            budget.take(chunk).unwrap();
        }
        assert_eq!(budget.received, 25 * BYTES_PER_MB);
    }

    #[test]
    fn test_budget_stops_at_first_chunk_over_limit() {
        let mut budget = UploadBudget::for_plan(PlanType::Free);
        budget.take(25 * BYTES_PER_MB as usize).unwrap();
        let err = budget.take(1).unwrap_err();
        match err {
            AppError::Validation(msg) => {
                assert_eq!(msg, "File exceeds the 25 MB limit for your plan")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
