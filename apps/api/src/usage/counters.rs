//! Daily chat and upload counters stored on the `users` row.
//!
//! Two mechanisms bring a counter back to zero:
//! - a limit-hit lock older than 24 hours clears that one counter;
//! - once `chat_reset_date` has passed (or was never set) both counters and
//!   both locks are cleared and the next reset is scheduled a day out.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::user::UserRow;
use crate::usage::plans::{can_start_chat, can_upload_file, plan_config, Limit, PlanType};

const LOCK_DURATION_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounters {
    pub plan: PlanType,
    pub daily_chats: u32,
    pub daily_file_uploads: u32,
    pub chat_reset_date: Option<DateTime<Utc>>,
    pub limit_hit_chat_at: Option<DateTime<Utc>>,
    pub limit_hit_upload_at: Option<DateTime<Utc>>,
}

impl From<&UserRow> for UsageCounters {
    fn from(user: &UserRow) -> Self {
        Self {
            plan: PlanType::from_db(user.subscription_plan.as_deref()),
            daily_chats: user.daily_chats.max(0) as u32,
            daily_file_uploads: user.daily_file_uploads.max(0) as u32,
            chat_reset_date: user.chat_reset_date,
            limit_hit_chat_at: user.limit_hit_chat_at,
            limit_hit_upload_at: user.limit_hit_upload_at,
        }
    }
}

/// Returns the counters after any due resets, or `None` when nothing changed.
pub fn apply_resets(counters: &UsageCounters, now: DateTime<Utc>) -> Option<UsageCounters> {
    let mut next = counters.clone();
    let lock = Duration::hours(LOCK_DURATION_HOURS);

    if let Some(hit) = next.limit_hit_chat_at {
        if now >= hit + lock {
            next.daily_chats = 0;
            next.limit_hit_chat_at = None;
        }
    }

    if let Some(hit) = next.limit_hit_upload_at {
        if now >= hit + lock {
            next.daily_file_uploads = 0;
            next.limit_hit_upload_at = None;
        }
    }

    // The daily cycle overrides any lock still in force.
    let cycle_due = next.chat_reset_date.map_or(true, |reset| now >= reset);
    if cycle_due {
        next.daily_chats = 0;
        next.daily_file_uploads = 0;
        next.chat_reset_date = Some(now + Duration::days(1));
        next.limit_hit_chat_at = None;
        next.limit_hit_upload_at = None;
    }

    (next != *counters).then_some(next)
}

/// When a locked counter becomes usable again: the earlier of the lock
/// expiring and the next daily reset.
pub fn unlock_time(
    hit_at: Option<DateTime<Utc>>,
    chat_reset_date: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    let lock_end = hit_at.map(|hit| hit + Duration::hours(LOCK_DURATION_HOURS));
    match (lock_end, chat_reset_date) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Database helpers
// ────────────────────────────────────────────────────────────────────────────

pub async fn load_user(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRow>> {
    Ok(
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?,
    )
}

pub async fn load_counters(pool: &PgPool, user_id: Uuid) -> Result<Option<UsageCounters>> {
    Ok(load_user(pool, user_id).await?.as_ref().map(UsageCounters::from))
}

/// Applies due resets and persists them. Returns the current counters, or
/// `None` if the user does not exist.
pub async fn reset_if_due(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Option<UsageCounters>> {
    let Some(counters) = load_counters(pool, user_id).await? else {
        return Ok(None);
    };

    let Some(next) = apply_resets(&counters, now) else {
        return Ok(Some(counters));
    };

    sqlx::query(
        r#"
        UPDATE users
        SET daily_chats = $1,
            daily_file_uploads = $2,
            chat_reset_date = $3,
            limit_hit_chat_at = $4,
            limit_hit_upload_at = $5
        WHERE id = $6
        "#,
    )
    .bind(next.daily_chats as i32)
    .bind(next.daily_file_uploads as i32)
    .bind(next.chat_reset_date)
    .bind(next.limit_hit_chat_at)
    .bind(next.limit_hit_upload_at)
    .bind(user_id)
    .execute(pool)
    .await?;

    debug!("Reset usage counters for user {user_id}");
    Ok(Some(next))
}

pub async fn increment_chats(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE users SET daily_chats = daily_chats + 1 WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn increment_file_uploads(pool: &PgPool, user_id: Uuid, count: u32) -> Result<()> {
    sqlx::query("UPDATE users SET daily_file_uploads = daily_file_uploads + $1 WHERE id = $2")
        .bind(count as i32)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Starts the 24h chat lock. An existing lock is left untouched.
pub async fn record_chat_limit_hit(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE users SET limit_hit_chat_at = NOW() WHERE id = $1 AND limit_hit_chat_at IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Starts the 24h upload lock. An existing lock is left untouched.
pub async fn record_upload_limit_hit(pool: &PgPool, user_id: Uuid) -> Result<()> {
    sqlx::query(
        "UPDATE users SET limit_hit_upload_at = NOW() WHERE id = $1 AND limit_hit_upload_at IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Resets what is due, then checks the chat limit. On refusal the lock is
/// recorded and `LimitReached` is returned.
pub async fn ensure_can_chat(pool: &PgPool, user_id: Uuid) -> Result<UsageCounters, AppError> {
    let now = Utc::now();
    let counters = reset_if_due(pool, user_id, now)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if can_start_chat(counters.plan, counters.daily_chats) {
        return Ok(counters);
    }

    record_chat_limit_hit(pool, user_id).await?;
    info!("User {user_id} hit the daily chat limit");

    let limit = plan_config(counters.plan).limits.chats_per_day;
    Err(AppError::LimitReached {
        message: "Daily chat limit reached".to_string(),
        remaining: 0,
        total: limit.count().unwrap_or_default(),
        reset_date: unlock_time(
            Some(counters.limit_hit_chat_at.unwrap_or(now)),
            counters.chat_reset_date,
        ),
    })
}

/// Upload counterpart of [`ensure_can_chat`].
pub async fn ensure_can_upload(pool: &PgPool, user_id: Uuid) -> Result<UsageCounters, AppError> {
    let now = Utc::now();
    let counters = reset_if_due(pool, user_id, now)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if can_upload_file(counters.plan, counters.daily_file_uploads) {
        return Ok(counters);
    }

    record_upload_limit_hit(pool, user_id).await?;
    info!("User {user_id} hit the daily upload limit");

    let limit = plan_config(counters.plan).limits.file_uploads_per_day;
    Err(AppError::LimitReached {
        message: "Daily file upload limit reached".to_string(),
        remaining: 0,
        total: limit.count().unwrap_or_default(),
        reset_date: unlock_time(
            Some(counters.limit_hit_upload_at.unwrap_or(now)),
            counters.chat_reset_date,
        ),
    })
}

/// Remaining chats after this one has been counted.
pub fn remaining_after_chat(counters: &UsageCounters) -> Limit {
    plan_config(counters.plan)
        .limits
        .chats_per_day
        .remaining(counters.daily_chats + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn counters() -> UsageCounters {
        UsageCounters {
            plan: PlanType::Free,
            daily_chats: 15,
            daily_file_uploads: 5,
            chat_reset_date: Some(now() + Duration::hours(6)),
            limit_hit_chat_at: None,
            limit_hit_upload_at: None,
        }
    }

    #[test]
    fn test_nothing_due() {
        assert!(apply_resets(&counters(), now()).is_none());
    }

    #[test]
    fn test_missing_reset_date_resets_everything() {
        let c = UsageCounters {
            chat_reset_date: None,
            ..counters()
        };
        let next = apply_resets(&c, now()).unwrap();
        assert_eq!(next.daily_chats, 0);
        assert_eq!(next.daily_file_uploads, 0);
        assert_eq!(next.chat_reset_date, Some(now() + Duration::days(1)));
    }

    #[test]
    fn test_passed_reset_date_clears_locks() {
        let c = UsageCounters {
            chat_reset_date: Some(now() - Duration::minutes(1)),
            limit_hit_chat_at: Some(now() - Duration::hours(2)),
            limit_hit_upload_at: Some(now() - Duration::hours(3)),
            ..counters()
        };
        let next = apply_resets(&c, now()).unwrap();
        assert!(next.limit_hit_chat_at.is_none());
        assert!(next.limit_hit_upload_at.is_none());
        assert_eq!(next.daily_chats, 0);
    }

    #[test]
    fn test_expired_chat_lock_only_clears_chats() {
        let c = UsageCounters {
            limit_hit_chat_at: Some(now() - Duration::hours(24)),
            ..counters()
        };
        let next = apply_resets(&c, now()).unwrap();
        assert_eq!(next.daily_chats, 0);
        assert!(next.limit_hit_chat_at.is_none());
        assert_eq!(next.daily_file_uploads, 5);
        assert_eq!(next.chat_reset_date, c.chat_reset_date);
    }

    #[test]
    fn test_active_lock_kept() {
        let c = UsageCounters {
            limit_hit_upload_at: Some(now() - Duration::hours(23)),
            ..counters()
        };
        assert!(apply_resets(&c, now()).is_none());
    }

    #[test]
    fn test_unlock_time_picks_earliest() {
        let hit = now();
        let reset = now() + Duration::hours(6);
        assert_eq!(unlock_time(Some(hit), Some(reset)), Some(reset));
        assert_eq!(
            unlock_time(Some(hit), None),
            Some(hit + Duration::hours(24))
        );
        assert_eq!(unlock_time(None, None), None);
    }

    #[test]
    fn test_remaining_after_chat() {
        let c = UsageCounters {
            daily_chats: 3,
            ..counters()
        };
        assert_eq!(remaining_after_chat(&c), Limit::Count(11));
        let pro = UsageCounters {
            plan: PlanType::Pro,
            ..c
        };
        assert_eq!(remaining_after_chat(&pro), Limit::Unlimited);
    }
}
