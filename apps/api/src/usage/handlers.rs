//! Axum route handlers for usage and plan endpoints.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::UserIdQuery;
use crate::state::AppState;
use crate::usage::counters::{reset_if_due, UsageCounters};
use crate::usage::plans::{
    plan_config, remaining_chats, remaining_file_uploads, usage_percentage, Limit, PlanLimits,
    PlanType,
};
use crate::usage::web_search::{limit_message, web_search_remaining, WebSearchQuota};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResponse {
    pub plan: PlanType,
    pub daily_chats: u32,
    pub daily_file_uploads: u32,
    pub chat_reset_date: Option<DateTime<Utc>>,
    pub remaining_chats: Limit,
    pub remaining_file_uploads: Limit,
    pub chat_usage_percent: f64,
    pub upload_usage_percent: f64,
    pub limits: PlanLimits,
}

impl UsageResponse {
    fn from_counters(counters: &UsageCounters) -> Self {
        let limits = plan_config(counters.plan).limits;
        Self {
            plan: counters.plan,
            daily_chats: counters.daily_chats,
            daily_file_uploads: counters.daily_file_uploads,
            chat_reset_date: counters.chat_reset_date,
            remaining_chats: remaining_chats(counters.plan, counters.daily_chats),
            remaining_file_uploads: remaining_file_uploads(
                counters.plan,
                counters.daily_file_uploads,
            ),
            chat_usage_percent: usage_percentage(limits.chats_per_day, counters.daily_chats),
            upload_usage_percent: usage_percentage(
                limits.file_uploads_per_day,
                counters.daily_file_uploads,
            ),
            limits,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct WebSearchStatusResponse {
    #[serde(flatten)]
    pub quota: WebSearchQuota,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanRequest {
    pub user_id: Uuid,
    pub plan: PlanType,
}

#[derive(Debug, Serialize)]
pub struct UpdatePlanResponse {
    pub success: bool,
    pub plan: PlanType,
}

/// GET /api/user/usage
pub async fn handle_usage(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<UsageResponse>, AppError> {
    let counters = reset_if_due(&state.db, params.user_id, Utc::now())
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(UsageResponse::from_counters(&counters)))
}

/// GET /api/user/web-search-status
pub async fn handle_web_search_status(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<WebSearchStatusResponse>, AppError> {
    let quota = web_search_remaining(&state.db, params.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let message = limit_message(quota.remaining, quota.total);
    Ok(Json(WebSearchStatusResponse { quota, message }))
}

/// PATCH /api/user/plan
pub async fn handle_update_plan(
    State(state): State<AppState>,
    Json(req): Json<UpdatePlanRequest>,
) -> Result<Json<UpdatePlanResponse>, AppError> {
    let result = sqlx::query("UPDATE users SET subscription_plan = $1 WHERE id = $2")
        .bind(req.plan.as_str())
        .bind(req.user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    info!("User {} moved to the {} plan", req.user_id, req.plan.as_str());
    Ok(Json(UpdatePlanResponse {
        success: true,
        plan: req.plan,
    }))
}
