//! Plus-tier records. Every endpoint here is CRUD only and requires the
//! caller to be on the Plus plan.

pub mod api_keys;
pub mod team;
pub mod training;

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::usage::counters::load_user;
use crate::usage::plans::PlanType;

/// 404 when the user does not exist, 403 when they are not on Plus.
pub async fn require_plus(pool: &PgPool, user_id: Uuid) -> Result<(), AppError> {
    let user = load_user(pool, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    match PlanType::from_db(user.subscription_plan.as_deref()) {
        PlanType::Plus => Ok(()),
        _ => Err(AppError::Forbidden),
    }
}
