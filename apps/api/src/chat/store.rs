use anyhow::Result;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::chat::HISTORY_LIMIT;
use crate::models::chat::{ChatMessageRow, ChatSessionRow};

pub async fn load_session(
    pool: &PgPool,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<Option<ChatSessionRow>> {
    Ok(sqlx::query_as::<_, ChatSessionRow>(
        "SELECT * FROM chat_sessions WHERE id = $1 AND user_id = $2",
    )
    .bind(session_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?)
}

pub async fn create_session(pool: &PgPool, user_id: Uuid, title: &str) -> Result<ChatSessionRow> {
    Ok(sqlx::query_as::<_, ChatSessionRow>(
        r#"
        INSERT INTO chat_sessions (id, user_id, title)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(title)
    .fetch_one(pool)
    .await?)
}

pub async fn list_sessions(pool: &PgPool, user_id: Uuid) -> Result<Vec<ChatSessionRow>> {
    Ok(sqlx::query_as::<_, ChatSessionRow>(
        "SELECT * FROM chat_sessions WHERE user_id = $1 ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?)
}

/// The most recent messages of a session, newest first.
pub async fn recent_messages(pool: &PgPool, session_id: Uuid) -> Result<Vec<ChatMessageRow>> {
    Ok(sqlx::query_as::<_, ChatMessageRow>(
        r#"
        SELECT * FROM chat_messages
        WHERE session_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(session_id)
    .bind(HISTORY_LIMIT)
    .fetch_all(pool)
    .await?)
}

pub async fn session_messages(pool: &PgPool, session_id: Uuid) -> Result<Vec<ChatMessageRow>> {
    Ok(sqlx::query_as::<_, ChatMessageRow>(
        "SELECT * FROM chat_messages WHERE session_id = $1 ORDER BY created_at ASC",
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?)
}

pub struct NewMessage<'a> {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub prompt: &'a str,
    pub response: &'a str,
    pub tool: Option<&'a str>,
    pub attachments: Value,
}

/// Inserts the message and bumps the session's `updated_at`.
pub async fn insert_message(pool: &PgPool, message: NewMessage<'_>) -> Result<ChatMessageRow> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, ChatMessageRow>(
        r#"
        INSERT INTO chat_messages (id, session_id, user_id, prompt, response, tool, attachments)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(message.session_id)
    .bind(message.user_id)
    .bind(message.prompt)
    .bind(message.response)
    .bind(message.tool)
    .bind(&message.attachments)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE chat_sessions SET updated_at = NOW() WHERE id = $1")
        .bind(message.session_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row)
}

/// Deletes a session and its messages. Returns `false` if nothing matched.
pub async fn delete_session(pool: &PgPool, user_id: Uuid, session_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM chat_sessions WHERE id = $1 AND user_id = $2")
        .bind(session_id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
