//! Monthly web search quota.
//!
//! This quota is its own table and does not read `PlanLimits`: Plus users get
//! 80 searches a month here even though the plan listing says unlimited.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::usage::counters::load_user;
use crate::usage::plans::PlanType;

const RESET_PERIOD_DAYS: i64 = 30;

pub fn monthly_limit(plan: PlanType) -> u32 {
    match plan {
        PlanType::Free => 5,
        PlanType::Pro => 50,
        PlanType::Plus => 80,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebSearchQuota {
    pub remaining: u32,
    pub total: u32,
    pub reset_date: Option<DateTime<Utc>>,
    pub plan: PlanType,
}

/// Result of checking the quota at `now`. `reset_to` is set when the stored
/// counter must be zeroed and the reset date moved to that instant.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotaEvaluation {
    pub quota: WebSearchQuota,
    pub reset_to: Option<DateTime<Utc>>,
}

pub fn evaluate_quota(
    plan: PlanType,
    used: u32,
    reset_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> QuotaEvaluation {
    let total = monthly_limit(plan);

    match reset_date {
        Some(reset) if now <= reset => QuotaEvaluation {
            quota: WebSearchQuota {
                remaining: total.saturating_sub(used),
                total,
                reset_date: Some(reset),
                plan,
            },
            reset_to: None,
        },
        _ => {
            let next = now + Duration::days(RESET_PERIOD_DAYS);
            QuotaEvaluation {
                quota: WebSearchQuota {
                    remaining: total,
                    total,
                    reset_date: Some(next),
                    plan,
                },
                reset_to: Some(next),
            }
        }
    }
}

pub fn limit_message(remaining: u32, total: u32) -> String {
    if remaining == 0 {
        format!("🔍 Web Search Limit Reached ({total}/{total} searches used)")
    } else if remaining <= 10 {
        format!("🔍 Web Search ({remaining}/{total} remaining) - Low")
    } else {
        format!("🔍 Web Search ({remaining}/{total})")
    }
}

/// Current quota for a user, persisting a monthly reset if one is due.
/// Returns `None` if the user does not exist.
pub async fn web_search_remaining(pool: &PgPool, user_id: Uuid) -> Result<Option<WebSearchQuota>> {
    let Some(user) = load_user(pool, user_id).await? else {
        return Ok(None);
    };

    let plan = PlanType::from_db(user.subscription_plan.as_deref());
    let used = user.monthly_web_searches.max(0) as u32;
    let eval = evaluate_quota(plan, used, user.web_search_reset_date, Utc::now());

    if let Some(next) = eval.reset_to {
        sqlx::query(
            "UPDATE users SET monthly_web_searches = 0, web_search_reset_date = $1 WHERE id = $2",
        )
        .bind(next)
        .bind(user_id)
        .execute(pool)
        .await?;
        debug!("Reset monthly web searches for user {user_id}");
    }

    Ok(Some(eval.quota))
}

/// Counts one search. Returns `false` without writing when the quota is
/// already used up.
pub async fn consume_web_search(pool: &PgPool, user_id: Uuid) -> Result<bool> {
    let Some(quota) = web_search_remaining(pool, user_id).await? else {
        return Ok(false);
    };
    if quota.remaining == 0 {
        return Ok(false);
    }

    let result = sqlx::query(
        r#"
        UPDATE users
        SET monthly_web_searches = monthly_web_searches + 1
        WHERE id = $1 AND monthly_web_searches < $2
        "#,
    )
    .bind(user_id)
    .bind(quota.total as i32)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_limits_per_plan() {
        assert_eq!(monthly_limit(PlanType::Free), 5);
        assert_eq!(monthly_limit(PlanType::Pro), 50);
        assert_eq!(monthly_limit(PlanType::Plus), 80);
    }

    #[test]
    fn test_within_period() {
        let reset = now() + Duration::days(3);
        let eval = evaluate_quota(PlanType::Free, 2, Some(reset), now());
        assert_eq!(eval.quota.remaining, 3);
        assert_eq!(eval.quota.total, 5);
        assert!(eval.reset_to.is_none());
    }

    #[test]
    fn test_overused_clamps_to_zero() {
        let reset = now() + Duration::days(3);
        let eval = evaluate_quota(PlanType::Free, 9, Some(reset), now());
        assert_eq!(eval.quota.remaining, 0);
    }

    #[test]
    fn test_expired_period_resets() {
        let eval = evaluate_quota(PlanType::Pro, 50, Some(now() - Duration::seconds(1)), now());
        assert_eq!(eval.quota.remaining, 50);
        assert_eq!(eval.reset_to, Some(now() + Duration::days(30)));
    }

    #[test]
    fn test_missing_reset_date_resets() {
        let eval = evaluate_quota(PlanType::Plus, 0, None, now());
        assert_eq!(eval.quota.total, 80);
        assert!(eval.reset_to.is_some());
    }

    #[test]
    fn test_limit_message() {
        assert_eq!(limit_message(0, 5), "🔍 Web Search Limit Reached (5/5 searches used)");
        assert_eq!(limit_message(4, 5), "🔍 Web Search (4/5 remaining) - Low");
        assert_eq!(limit_message(40, 50), "🔍 Web Search (40/50)");
    }
}
