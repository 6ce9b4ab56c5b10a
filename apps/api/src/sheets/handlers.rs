//! Axum route handlers for the Sheets API.

use aws_sdk_s3::primitives::ByteStream;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::spreadsheet::{SpreadsheetEditRow, SpreadsheetRow};
use crate::models::user::UserIdQuery;
use crate::sheets::export::{export, ExportFormat};
use crate::sheets::operations::{
    apply_operations, cell_text, column_index, insert_rows, ApplyOutcome, Cell, EditOperation,
    Grid,
};
use crate::sheets::tracking::{
    create_spreadsheet, edit_count, edit_history, load_spreadsheet, log_edit,
    parse_current_data, store_current_data, EditRecord,
};
use crate::sheets::transforms::{filter_rows, find_replace, sort_by_column, stats, SheetStats};
use crate::sheets::validation::validate_data;
use crate::state::AppState;
use crate::usage::counters::load_user;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 500;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSheetRequest {
    pub user_id: Uuid,
    pub title: String,
    pub sheet_title: Option<String>,
    pub data: Option<Grid>,
}

#[derive(Debug, Serialize)]
pub struct CreateSheetResponse {
    pub success: bool,
    pub spreadsheet: SpreadsheetSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpreadsheetSummary {
    pub id: Uuid,
    pub title: String,
    pub sheet_title: String,
    pub edit_count: i32,
    pub last_edited_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&SpreadsheetRow> for SpreadsheetSummary {
    fn from(row: &SpreadsheetRow) -> Self {
        Self {
            id: row.id,
            title: row.title.clone(),
            sheet_title: row.sheet_title.clone(),
            edit_count: row.edit_count,
            last_edited_at: row.last_edited_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSheetRequest {
    pub user_id: Uuid,
    pub spreadsheet_id: Uuid,
    pub operations: Vec<EditOperation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditSheetResponse {
    pub success: bool,
    pub data: Grid,
    pub operation_errors: Vec<String>,
    pub stats: SheetStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditHistoryQuery {
    pub spreadsheet_id: Uuid,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    #[serde(default)]
    pub count: bool,
}

#[derive(Debug, Serialize)]
pub struct EditHistoryResponse {
    pub success: bool,
    pub edits: Vec<SpreadsheetEditRow>,
    pub count: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Serialize)]
pub struct SpreadsheetDetailResponse {
    pub spreadsheet: SpreadsheetSummary,
    pub data: Grid,
    pub stats: SheetStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindReplaceRequest {
    pub user_id: Uuid,
    pub find: Value,
    pub replace: Value,
    pub column: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct FindReplaceResponse {
    pub success: bool,
    pub replaced: usize,
    pub data: Grid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewQuery {
    pub user_id: Uuid,
    pub sort_column: Option<usize>,
    /// Header name; takes precedence over `sortColumn`.
    pub sort_by: Option<String>,
    #[serde(default)]
    pub descending: bool,
    pub filter_column: Option<usize>,
    pub filter_by: Option<String>,
    /// Case-insensitive substring the filter column must contain.
    pub contains: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRowsRequest {
    pub user_id: Uuid,
    pub rows: Vec<Vec<Cell>>,
    /// Row index to insert at. Defaults to the end; never above the header.
    pub start: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRowsResponse {
    pub success: bool,
    pub inserted: usize,
    pub data: Grid,
    pub stats: SheetStats,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    pub user_id: Uuid,
    pub format: ExportFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportResponse {
    pub key: String,
    pub content_type: &'static str,
    pub content: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/sheets/create
pub async fn handle_create(
    State(state): State<AppState>,
    Json(req): Json<CreateSheetRequest>,
) -> Result<Json<CreateSheetResponse>, AppError> {
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }

    load_user(&state.db, req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let data = req.data.unwrap_or_default();
    if !data.is_empty() {
        let validation = validate_data(&data);
        if !validation.valid {
            return Err(AppError::InvalidData {
                message: "Invalid initial data".to_string(),
                validation_errors: validation.errors,
            });
        }
    }

    let sheet_title = req.sheet_title.as_deref().unwrap_or("Sheet1");
    let row = create_spreadsheet(&state.db, req.user_id, req.title.trim(), sheet_title, &data).await?;

    Ok(Json(CreateSheetResponse {
        success: true,
        spreadsheet: SpreadsheetSummary::from(&row),
    }))
}

/// POST /api/sheets/edit
///
/// Reads `current_data`, applies the operations in order, validates the
/// result and overwrites the stored grid. Operation-level failures are
/// returned alongside the new grid; a grid that fails validation is not
/// stored.
pub async fn handle_edit(
    State(state): State<AppState>,
    Json(req): Json<EditSheetRequest>,
) -> Result<Json<EditSheetResponse>, AppError> {
    let sheet = load_spreadsheet(&state.db, req.user_id, req.spreadsheet_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Spreadsheet not found".to_string()))?;

    let current = parse_current_data(sheet.current_data.as_ref());
    let outcome = apply_and_validate(&current, &req.operations)?;

    let new_count = sheet.edit_count + outcome.applied.len() as i32;
    store_current_data(&state.db, req.user_id, sheet.id, &outcome.data, new_count).await?;

    for applied in &outcome.applied {
        let record = EditRecord::from_applied(applied);
        if let Err(e) = log_edit(&state.db, req.user_id, sheet.id, &record).await {
            warn!("Failed to log {} edit for spreadsheet {}: {e}", record.operation_type, sheet.id);
        }
    }

    info!(
        "Applied {} of {} operations to spreadsheet {}",
        outcome.applied.len(),
        req.operations.len(),
        sheet.id
    );

    let stats = stats(&outcome.data);
    Ok(Json(EditSheetResponse {
        success: true,
        data: outcome.data,
        operation_errors: outcome.errors,
        stats,
    }))
}

/// GET /api/sheets/edit-history
pub async fn handle_edit_history(
    State(state): State<AppState>,
    Query(params): Query<EditHistoryQuery>,
) -> Result<Json<EditHistoryResponse>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let edits = edit_history(&state.db, params.spreadsheet_id, limit, offset).await?;

    let count = if params.count {
        Some(edit_count(&state.db, params.spreadsheet_id).await?)
    } else {
        None
    };

    Ok(Json(EditHistoryResponse {
        success: true,
        edits,
        count,
        limit,
        offset,
    }))
}

/// GET /api/sheets/:id
pub async fn handle_get_sheet(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<SpreadsheetDetailResponse>, AppError> {
    let sheet = require_sheet(&state, params.user_id, id).await?;
    let data = parse_current_data(sheet.current_data.as_ref());
    let stats = stats(&data);

    Ok(Json(SpreadsheetDetailResponse {
        spreadsheet: SpreadsheetSummary::from(&sheet),
        data,
        stats,
    }))
}

/// POST /api/sheets/:id/find-replace
pub async fn handle_find_replace(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<FindReplaceRequest>,
) -> Result<Json<FindReplaceResponse>, AppError> {
    let sheet = require_sheet(&state, req.user_id, id).await?;
    let current = parse_current_data(sheet.current_data.as_ref());

    let (data, replaced) = find_replace(&current, &req.find, &req.replace, req.column);

    if replaced > 0 {
        store_current_data(&state.db, req.user_id, sheet.id, &data, sheet.edit_count + 1).await?;
        let record = EditRecord {
            operation_type: "find_replace",
            operation_data: json!({
                "find": req.find,
                "replace": req.replace,
                "column": req.column,
            }),
            previous_data: None,
            new_data: Some(json!({ "replaced": replaced })),
        };
        if let Err(e) = log_edit(&state.db, req.user_id, sheet.id, &record).await {
            warn!("Failed to log find_replace edit for spreadsheet {}: {e}", sheet.id);
        }
    }

    Ok(Json(FindReplaceResponse {
        success: true,
        replaced,
        data,
    }))
}

/// GET /api/sheets/:id/view
///
/// Read-only sorted and/or filtered view. Nothing is persisted.
pub async fn handle_view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<ViewQuery>,
) -> Result<Json<SpreadsheetDetailResponse>, AppError> {
    let sheet = require_sheet(&state, params.user_id, id).await?;
    let mut data = parse_current_data(sheet.current_data.as_ref());

    let filter_column = resolve_column(&data, params.filter_column, params.filter_by.as_deref())?;
    let sort_column = resolve_column(&data, params.sort_column, params.sort_by.as_deref())?;

    if let Some((column, needle)) = view_filter(filter_column, params.contains.as_deref())? {
        let needle = needle.to_lowercase();
        data = filter_rows(&data, column, |cell| {
            cell.map(|c| cell_text(c).to_lowercase().contains(&needle))
                .unwrap_or(false)
        });
    }

    if let Some(column) = sort_column {
        data = sort_by_column(&data, column, params.descending);
    }

    let stats = stats(&data);
    Ok(Json(SpreadsheetDetailResponse {
        spreadsheet: SpreadsheetSummary::from(&sheet),
        data,
        stats,
    }))
}

/// POST /api/sheets/:id/rows
///
/// Bulk insert, typically used to append imported rows.
pub async fn handle_insert_rows(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<InsertRowsRequest>,
) -> Result<Json<InsertRowsResponse>, AppError> {
    if req.rows.is_empty() {
        return Err(AppError::Validation("rows cannot be empty".to_string()));
    }

    let sheet = require_sheet(&state, req.user_id, id).await?;
    let current = parse_current_data(sheet.current_data.as_ref());

    let start = req.start.unwrap_or(current.len()).max(usize::from(!current.is_empty()));
    let inserted = req.rows.len();
    let data = insert_rows(&current, start, req.rows);

    let validation = validate_data(&data);
    if !validation.valid {
        return Err(AppError::InvalidData {
            message: "Invalid data after inserting rows".to_string(),
            validation_errors: validation.errors,
        });
    }

    store_current_data(&state.db, req.user_id, sheet.id, &data, sheet.edit_count + 1).await?;
    let record = EditRecord {
        operation_type: "rows_insert",
        operation_data: json!({ "start": start, "count": inserted }),
        previous_data: None,
        new_data: Some(json!({ "rowCount": data.len() })),
    };
    if let Err(e) = log_edit(&state.db, req.user_id, sheet.id, &record).await {
        warn!("Failed to log rows_insert edit for spreadsheet {}: {e}", sheet.id);
    }

    info!("Inserted {inserted} rows into spreadsheet {} at {start}", sheet.id);

    let stats = stats(&data);
    Ok(Json(InsertRowsResponse {
        success: true,
        inserted,
        data,
        stats,
    }))
}

/// POST /api/sheets/:id/export
///
/// Renders the grid and uploads it to `exports/<user>/<sheet>.<ext>`.
pub async fn handle_export(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ExportRequest>,
) -> Result<Json<ExportResponse>, AppError> {
    let sheet = require_sheet(&state, req.user_id, id).await?;
    let data = parse_current_data(sheet.current_data.as_ref());

    let content = export(&data, req.format, &sheet.title)?;
    let key = format!("exports/{}/{}.{}", req.user_id, sheet.id, req.format.extension());

    state
        .s3
        .put_object()
        .bucket(&state.config.s3_bucket)
        .key(&key)
        .body(ByteStream::from(content.clone().into_bytes()))
        .content_type(req.format.content_type())
        .send()
        .await
        .map_err(|e| AppError::Storage(format!("export upload failed: {e}")))?;

    info!("Exported spreadsheet {} to s3://{}/{}", sheet.id, state.config.s3_bucket, key);

    Ok(Json(ExportResponse {
        key,
        content_type: req.format.content_type(),
        content,
    }))
}

async fn require_sheet(
    state: &AppState,
    user_id: Uuid,
    id: Uuid,
) -> Result<SpreadsheetRow, AppError> {
    load_spreadsheet(&state.db, user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Spreadsheet {id} not found")))
}

/// Runs an edit batch against `current`. Operation-level failures stay in the
/// outcome; a result that is not a storable grid becomes `InvalidData`.
fn apply_and_validate(current: &[Vec<Cell>], ops: &[EditOperation]) -> Result<ApplyOutcome, AppError> {
    let outcome = apply_operations(current, ops);
    let validation = validate_data(&outcome.data);
    if !validation.valid {
        return Err(AppError::InvalidData {
            message: "Invalid data after operations".to_string(),
            validation_errors: validation.errors,
        });
    }
    Ok(outcome)
}

/// A filter needs both a column and a needle; one without the other is a
/// client mistake, not a request for the unfiltered grid.
fn view_filter(column: Option<usize>, contains: Option<&str>) -> Result<Option<(usize, &str)>, AppError> {
    match (column, contains) {
        (Some(column), Some(needle)) => Ok(Some((column, needle))),
        (None, None) => Ok(None),
        (Some(_), None) => Err(AppError::Validation(
            "filterColumn/filterBy requires contains".to_string(),
        )),
        (None, Some(_)) => Err(AppError::Validation(
            "contains requires filterColumn or filterBy".to_string(),
        )),
    }
}

/// Picks the column for a view parameter. A header name wins over an index.
fn resolve_column(
    grid: &[Vec<Cell>],
    index: Option<usize>,
    name: Option<&str>,
) -> Result<Option<usize>, AppError> {
    match name {
        Some(name) => column_index(grid, name)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("Unknown column '{name}'"))),
        None => Ok(index),
    }
}
