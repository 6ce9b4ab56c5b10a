use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::plus::TrainingJobRow;
use crate::models::user::UserIdQuery;
use crate::plus::require_plus;
use crate::state::AppState;

pub const DEFAULT_EPOCHS: i32 = 3;
pub const MAX_EPOCHS: i32 = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTrainingJobRequest {
    pub user_id: Uuid,
    pub model_name: String,
    pub data_url: String,
    pub epochs: Option<i32>,
    pub description: Option<String>,
}

/// Checked fields of a new job, ready to insert.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrainingJob {
    pub name: String,
    pub data_url: String,
    pub epochs: i32,
    pub description: Option<String>,
}

impl NewTrainingJob {
    pub fn from_request(req: &CreateTrainingJobRequest) -> Result<Self, AppError> {
        let name = req.model_name.trim();
        let data_url = req.data_url.trim();
        if name.is_empty() || data_url.is_empty() {
            return Err(AppError::Validation(
                "modelName and dataUrl are required".to_string(),
            ));
        }

        let epochs = req.epochs.unwrap_or(DEFAULT_EPOCHS);
        if !(1..=MAX_EPOCHS).contains(&epochs) {
            return Err(AppError::Validation(format!(
                "epochs must be between 1 and {MAX_EPOCHS}"
            )));
        }

        Ok(Self {
            name: name.to_string(),
            data_url: data_url.to_string(),
            epochs,
            description: req
                .description
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .map(str::to_string),
        })
    }
}

/// GET /api/plus/training
pub async fn handle_list_jobs(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<Value>, AppError> {
    require_plus(&state.db, params.user_id).await?;

    let jobs = sqlx::query_as::<_, TrainingJobRow>(
        "SELECT * FROM training_jobs WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(params.user_id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(json!({ "jobs": jobs })))
}

/// POST /api/plus/training
///
/// Records the job as `pending`. Nothing here runs it.
pub async fn handle_create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateTrainingJobRequest>,
) -> Result<Json<TrainingJobRow>, AppError> {
    let job = NewTrainingJob::from_request(&req)?;
    require_plus(&state.db, req.user_id).await?;

    let row = sqlx::query_as::<_, TrainingJobRow>(
        r#"
        INSERT INTO training_jobs (id, user_id, name, status, progress, data_url, epochs, description)
        VALUES ($1, $2, $3, 'pending', 0, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(req.user_id)
    .bind(&job.name)
    .bind(&job.data_url)
    .bind(job.epochs)
    .bind(&job.description)
    .fetch_one(&state.db)
    .await?;

    info!("Queued training job {} ({}) for user {}", row.id, row.name, req.user_id);
    Ok(Json(row))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateTrainingJobRequest {
        CreateTrainingJobRequest {
            user_id: Uuid::nil(),
            model_name: " tutor-v1 ".to_string(),
            data_url: "s3://bucket/data.jsonl".to_string(),
            epochs: None,
            description: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_defaults() {
        let job = NewTrainingJob::from_request(&request()).unwrap();
        assert_eq!(job.name, "tutor-v1");
        assert_eq!(job.epochs, DEFAULT_EPOCHS);
        assert!(job.description.is_none());
    }

    #[test]
    fn test_missing_fields_rejected() {
        let req = CreateTrainingJobRequest {
            data_url: String::new(),
            ..request()
        };
        assert!(matches!(
            NewTrainingJob::from_request(&req),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_epoch_bounds() {
        let zero = CreateTrainingJobRequest {
            epochs: Some(0),
            ..request()
        };
        assert!(NewTrainingJob::from_request(&zero).is_err());
        let ok = CreateTrainingJobRequest {
            epochs: Some(10),
            ..request()
        };
        assert_eq!(NewTrainingJob::from_request(&ok).unwrap().epochs, 10);
    }
}
