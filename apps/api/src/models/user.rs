use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    /// `free`, `pro` or `plus`; NULL is treated as `free`.
    pub subscription_plan: Option<String>,
    pub daily_chats: i32,
    pub daily_file_uploads: i32,
    pub chat_reset_date: Option<DateTime<Utc>>,
    pub limit_hit_chat_at: Option<DateTime<Utc>>,
    pub limit_hit_upload_at: Option<DateTime<Utc>>,
    pub monthly_web_searches: i32,
    pub web_search_reset_date: Option<DateTime<Utc>>,
    pub full_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `?userId=` query string carried by user-scoped reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdQuery {
    pub user_id: Uuid,
}
