use anyhow::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::contains_pattern;
use crate::models::learning::QuizResultRow;

const HISTORY_LIMIT: i64 = 20;

pub async fn save_result(
    pool: &PgPool,
    user_id: Uuid,
    topic: &str,
    score: u32,
    total: u32,
) -> Result<QuizResultRow> {
    Ok(sqlx::query_as::<_, QuizResultRow>(
        r#"
        INSERT INTO quiz_results (id, user_id, topic, score, total)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(topic)
    .bind(score as i32)
    .bind(total as i32)
    .fetch_one(pool)
    .await?)
}

/// The latest results, newest first, optionally for topics containing `topic`.
pub async fn history(pool: &PgPool, user_id: Uuid, topic: Option<&str>) -> Result<Vec<QuizResultRow>> {
    Ok(sqlx::query_as::<_, QuizResultRow>(
        r#"
        SELECT * FROM quiz_results
        WHERE user_id = $1 AND ($2::text IS NULL OR topic ILIKE $2 ESCAPE '\')
        ORDER BY created_at DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(topic.map(contains_pattern))
    .bind(HISTORY_LIMIT)
    .fetch_all(pool)
    .await?)
}

/// Every result of a user, oldest first.
pub async fn all_results(pool: &PgPool, user_id: Uuid) -> Result<Vec<QuizResultRow>> {
    Ok(sqlx::query_as::<_, QuizResultRow>(
        "SELECT * FROM quiz_results WHERE user_id = $1 ORDER BY created_at ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}
