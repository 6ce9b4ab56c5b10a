//! Persistence for spreadsheets: `current_data` blobs and the append-only
//! `spreadsheet_edits` log.
//!
//! Writes to `current_data` are a plain overwrite. Two editors saving at the
//! same time both succeed and the later write wins.

use anyhow::Result;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::spreadsheet::{SpreadsheetEditRow, SpreadsheetRow};
use crate::sheets::operations::{AppliedOperation, Grid, Operation};

/// One row destined for `spreadsheet_edits`.
#[derive(Debug, Clone, PartialEq)]
pub struct EditRecord {
    pub operation_type: &'static str,
    pub operation_data: Value,
    pub previous_data: Option<Value>,
    pub new_data: Option<Value>,
}

impl EditRecord {
    pub fn from_applied(applied: &AppliedOperation) -> Self {
        let previous = applied.previous.clone();
        match &applied.operation {
            Operation::UpdateCell { row, column, value } => EditRecord {
                operation_type: "cell_update",
                operation_data: json!({ "row": row, "column": column, "value": value }),
                previous_data: Some(json!({ "oldValue": previous })),
                new_data: Some(json!({ "newValue": value })),
            },
            Operation::AddRow { row, index } => EditRecord {
                operation_type: "row_add",
                operation_data: json!({
                    "rowData": row,
                    "position": index.map(Value::from).unwrap_or_else(|| json!("end")),
                }),
                previous_data: None,
                new_data: Some(json!({ "rowData": row })),
            },
            Operation::RemoveRow { index } => EditRecord {
                operation_type: "row_delete",
                operation_data: json!({ "rowIndex": index }),
                previous_data: Some(json!({ "rowData": previous })),
                new_data: None,
            },
            Operation::AddColumn { name, index } => EditRecord {
                operation_type: "column_add",
                operation_data: json!({ "columnName": name, "columnIndex": index }),
                previous_data: None,
                new_data: Some(json!({ "columnName": name })),
            },
            Operation::RemoveColumn { index } => EditRecord {
                operation_type: "column_delete",
                operation_data: json!({ "columnIndex": index, "columnName": previous }),
                previous_data: Some(json!({ "columnName": previous })),
                new_data: None,
            },
            Operation::UpdateRow { index, row } => EditRecord {
                operation_type: "row_update",
                operation_data: json!({ "rowIndex": index, "rowData": row }),
                previous_data: Some(json!({ "rowData": previous })),
                new_data: Some(json!({ "rowData": row })),
            },
            Operation::ClearData => EditRecord {
                operation_type: "clear_data",
                operation_data: json!({}),
                previous_data: Some(json!({ "clearedRows": previous })),
                new_data: None,
            },
        }
    }
}

/// Decodes a stored `current_data` value. Accepts a JSON array of rows or a
/// string holding one; anything else yields an empty grid.
pub fn parse_current_data(raw: Option<&Value>) -> Grid {
    let parsed = match raw {
        None | Some(Value::Null) => return Vec::new(),
        Some(Value::String(s)) => serde_json::from_str::<Grid>(s),
        Some(other) => serde_json::from_value::<Grid>(other.clone()),
    };
    parsed.unwrap_or_else(|e| {
        warn!("Discarding unparsable current_data: {e}");
        Vec::new()
    })
}

pub async fn load_spreadsheet(
    pool: &PgPool,
    user_id: Uuid,
    spreadsheet_id: Uuid,
) -> Result<Option<SpreadsheetRow>> {
    Ok(sqlx::query_as::<_, SpreadsheetRow>(
        "SELECT * FROM spreadsheets WHERE id = $1 AND user_id = $2",
    )
    .bind(spreadsheet_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?)
}

pub async fn create_spreadsheet(
    pool: &PgPool,
    user_id: Uuid,
    title: &str,
    sheet_title: &str,
    data: &Grid,
) -> Result<SpreadsheetRow> {
    let row = sqlx::query_as::<_, SpreadsheetRow>(
        r#"
        INSERT INTO spreadsheets (id, user_id, title, sheet_title, current_data, edit_count)
        VALUES ($1, $2, $3, $4, $5, 0)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(title)
    .bind(sheet_title)
    .bind(json!(data))
    .fetch_one(pool)
    .await?;

    info!("Created spreadsheet {} for user {user_id}", row.id);
    Ok(row)
}

/// Overwrites `current_data`. No version check is made.
pub async fn store_current_data(
    pool: &PgPool,
    user_id: Uuid,
    spreadsheet_id: Uuid,
    data: &Grid,
    edit_count: i32,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE spreadsheets
        SET current_data = $1, last_edited_at = NOW(), edit_count = $2
        WHERE id = $3 AND user_id = $4
        "#,
    )
    .bind(json!(data))
    .bind(edit_count)
    .bind(spreadsheet_id)
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn log_edit(
    pool: &PgPool,
    user_id: Uuid,
    spreadsheet_id: Uuid,
    record: &EditRecord,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO spreadsheet_edits
            (id, user_id, spreadsheet_id, operation_type, operation_data, previous_data, new_data)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(spreadsheet_id)
    .bind(record.operation_type)
    .bind(&record.operation_data)
    .bind(&record.previous_data)
    .bind(&record.new_data)
    .execute(pool)
    .await?;
    Ok(id)
}

/// Newest edits first. Edits logged in the same request share `created_at`,
/// so `seq` breaks the tie and the last-applied operation comes first.
const EDIT_HISTORY_SQL: &str = r#"
    SELECT * FROM spreadsheet_edits
    WHERE spreadsheet_id = $1
    ORDER BY created_at DESC, seq DESC
    LIMIT $2 OFFSET $3
"#;

pub async fn edit_history(
    pool: &PgPool,
    spreadsheet_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<SpreadsheetEditRow>> {
    Ok(sqlx::query_as::<_, SpreadsheetEditRow>(EDIT_HISTORY_SQL)
    .bind(spreadsheet_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?)
}

pub async fn edit_count(pool: &PgPool, spreadsheet_id: Uuid) -> Result<i64> {
    Ok(
        sqlx::query_scalar("SELECT COUNT(*) FROM spreadsheet_edits WHERE spreadsheet_id = $1")
            .bind(spreadsheet_id)
            .fetch_one(pool)
            .await?,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(operation: Operation, previous: Option<Value>) -> AppliedOperation {
        AppliedOperation {
            operation,
            previous,
        }
    }

    #[test]
    fn test_edit_history_has_deterministic_order() {
        let order = EDIT_HISTORY_SQL
            .split("ORDER BY")
            .nth(1)
            .and_then(|rest| rest.split("LIMIT").next())
            .unwrap()
            .trim();
        assert_eq!(order, "created_at DESC, seq DESC");
    }

    #[test]
    fn test_parse_current_data_array() {
        let raw = json!([["a", "b"], [1, 2]]);
        let grid = parse_current_data(Some(&raw));
        assert_eq!(grid.len(), 2);
        assert_eq!(grid[1][1], json!(2));
    }

    #[test]
    fn test_parse_current_data_string_blob() {
        let raw = Value::String(r#"[["a"],["b"]]"#.to_string());
        assert_eq!(parse_current_data(Some(&raw)), vec![vec![json!("a")], vec![json!("b")]]);
    }

    #[test]
    fn test_parse_current_data_garbage_is_empty() {
        assert!(parse_current_data(Some(&json!("not json"))).is_empty());
        assert!(parse_current_data(Some(&json!({"rows": 1}))).is_empty());
        assert!(parse_current_data(None).is_empty());
        assert!(parse_current_data(Some(&Value::Null)).is_empty());
    }

    #[test]
    fn test_cell_update_record() {
        let r = EditRecord::from_applied(&applied(
            Operation::UpdateCell {
                row: 1,
                column: 2,
                value: json!("B+"),
            },
            Some(json!("B")),
        ));
        assert_eq!(r.operation_type, "cell_update");
        assert_eq!(r.operation_data, json!({"row": 1, "column": 2, "value": "B+"}));
        assert_eq!(r.previous_data, Some(json!({"oldValue": "B"})));
        assert_eq!(r.new_data, Some(json!({"newValue": "B+"})));
    }

    #[test]
    fn test_row_add_record_defaults_position_to_end() {
        let r = EditRecord::from_applied(&applied(
            Operation::AddRow {
                row: vec![json!("x")],
                index: None,
            },
            None,
        ));
        assert_eq!(r.operation_type, "row_add");
        assert_eq!(r.operation_data["position"], "end");
        assert!(r.previous_data.is_none());
    }

    #[test]
    fn test_column_delete_record_keeps_name() {
        let r = EditRecord::from_applied(&applied(
            Operation::RemoveColumn { index: 0 },
            Some(json!("Name")),
        ));
        assert_eq!(r.operation_type, "column_delete");
        assert_eq!(r.previous_data, Some(json!({"columnName": "Name"})));
        assert!(r.new_data.is_none());
    }
}
