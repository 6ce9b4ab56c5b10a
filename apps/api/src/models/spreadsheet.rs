use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SpreadsheetRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub sheet_title: String,
    /// Either a JSON array of rows or a string holding one (older rows).
    pub current_data: Option<Value>,
    pub edit_count: i32,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SpreadsheetEditRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub spreadsheet_id: Uuid,
    pub operation_type: String,
    pub operation_data: Value,
    pub previous_data: Option<Value>,
    pub new_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    /// Insertion order within the table.
    pub seq: i64,
}
