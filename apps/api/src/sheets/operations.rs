//! Spreadsheet operation engine.
//!
//! Every function here is pure: it takes the current grid by reference and
//! returns a fresh grid, so a failed operation never leaves a half-applied
//! edit behind.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A single cell. Any JSON scalar (or null) is accepted.
pub type Cell = Value;

/// Row-major cell grid. Row 0 is the header row.
pub type Grid = Vec<Vec<Cell>>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperationError {
    #[error("Invalid row index: {0}")]
    InvalidRowIndex(i64),

    #[error("Invalid column index: {0}")]
    InvalidColumnIndex(i64),

    #[error("{field} is required for {op}")]
    MissingField {
        field: &'static str,
        op: &'static str,
    },

    #[error("Unknown operation type: {0}")]
    UnknownType(String),
}

/// Wire form of an edit operation as sent by the editor.
///
/// Fields are optional because which ones are required depends on `type`;
/// `Operation::try_from` does that check so a bad operation becomes an
/// operation-level error instead of rejecting the whole request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOperation {
    #[serde(rename = "type")]
    pub op_type: String,
    pub row_index: Option<i64>,
    pub column_index: Option<i64>,
    pub row_data: Option<Vec<Cell>>,
    pub column_name: Option<String>,
    pub cell_value: Option<Cell>,
    /// `start` | `end` | `after` | `before`. Only `start` changes behaviour,
    /// and only when no explicit index is given.
    pub position: Option<String>,
}

/// A validated edit operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    AddRow { row: Vec<Cell>, index: Option<i64> },
    RemoveRow { index: i64 },
    AddColumn { name: String, index: Option<i64> },
    RemoveColumn { index: i64 },
    UpdateCell { row: i64, column: i64, value: Cell },
    UpdateRow { index: i64, row: Vec<Cell> },
    ClearData,
}

impl Operation {
    /// The wire `type` tag for this operation.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::AddRow { .. } => "add_row",
            Operation::RemoveRow { .. } => "remove_row",
            Operation::AddColumn { .. } => "add_column",
            Operation::RemoveColumn { .. } => "remove_column",
            Operation::UpdateCell { .. } => "update_cell",
            Operation::UpdateRow { .. } => "update_row",
            Operation::ClearData => "clear_data",
        }
    }

    pub fn apply(&self, grid: &[Vec<Cell>]) -> Result<Grid, OperationError> {
        match self {
            Operation::AddRow { row, index } => add_row(grid, row.clone(), *index),
            Operation::RemoveRow { index } => remove_row(grid, *index),
            Operation::AddColumn { name, index } => add_column(grid, name, *index),
            Operation::RemoveColumn { index } => remove_column(grid, *index),
            Operation::UpdateCell { row, column, value } => {
                update_cell(grid, *row, *column, value.clone())
            }
            Operation::UpdateRow { index, row } => update_row(grid, *index, row.clone()),
            Operation::ClearData => Ok(clear_data(grid)),
        }
    }

    /// The data this operation is about to overwrite or remove, captured
    /// before it runs. Used for the edit history.
    fn previous_value(&self, grid: &[Vec<Cell>]) -> Option<Value> {
        match self {
            Operation::RemoveRow { index } | Operation::UpdateRow { index, .. } => {
                get_row(grid, *index).ok().map(|r| Value::Array(r.to_vec()))
            }
            Operation::RemoveColumn { index } => Some(Value::String(column_name(grid, *index))),
            Operation::UpdateCell { row, column, .. } => get_cell(grid, *row, *column).ok().cloned(),
            Operation::ClearData => Some(Value::from(grid.len().saturating_sub(1))),
            Operation::AddRow { .. } | Operation::AddColumn { .. } => None,
        }
    }
}

impl TryFrom<&EditOperation> for Operation {
    type Error = OperationError;

    fn try_from(op: &EditOperation) -> Result<Self, Self::Error> {
        let at_start = op.position.as_deref() == Some("start");
        match op.op_type.as_str() {
            "add_row" => {
                let row = op.row_data.clone().ok_or(OperationError::MissingField {
                    field: "rowData",
                    op: "add_row",
                })?;
                let index = op.row_index.or(if at_start { Some(0) } else { None });
                Ok(Operation::AddRow { row, index })
            }
            "remove_row" => Ok(Operation::RemoveRow {
                index: op.row_index.ok_or(OperationError::MissingField {
                    field: "rowIndex",
                    op: "remove_row",
                })?,
            }),
            "add_column" => {
                let name = op
                    .column_name
                    .clone()
                    .filter(|n| !n.is_empty())
                    .ok_or(OperationError::MissingField {
                        field: "columnName",
                        op: "add_column",
                    })?;
                let index = op.column_index.or(if at_start { Some(0) } else { None });
                Ok(Operation::AddColumn { name, index })
            }
            "remove_column" => Ok(Operation::RemoveColumn {
                index: op.column_index.ok_or(OperationError::MissingField {
                    field: "columnIndex",
                    op: "remove_column",
                })?,
            }),
            "update_cell" => match (op.row_index, op.column_index) {
                (Some(row), Some(column)) => Ok(Operation::UpdateCell {
                    row,
                    column,
                    value: op.cell_value.clone().unwrap_or(Value::Null),
                }),
                _ => Err(OperationError::MissingField {
                    field: "rowIndex and columnIndex",
                    op: "update_cell",
                }),
            },
            "update_row" => {
                let index = op.row_index.ok_or(OperationError::MissingField {
                    field: "rowIndex",
                    op: "update_row",
                })?;
                let row = op.row_data.clone().ok_or(OperationError::MissingField {
                    field: "rowData",
                    op: "update_row",
                })?;
                Ok(Operation::UpdateRow { index, row })
            }
            "clear_data" => Ok(Operation::ClearData),
            other => Err(OperationError::UnknownType(other.to_string())),
        }
    }
}

/// An operation that succeeded, with what it replaced.
#[derive(Debug, Clone)]
pub struct AppliedOperation {
    pub operation: Operation,
    pub previous: Option<Value>,
}

/// Result of applying a batch. `errors` holds one message per failed
/// operation; the grid reflects every operation that succeeded.
#[derive(Debug, Clone)]
pub struct ApplyOutcome {
    pub data: Grid,
    pub errors: Vec<String>,
    pub applied: Vec<AppliedOperation>,
}

/// Applies operations in order. A failing operation is skipped and reported;
/// later operations still run against the last good grid.
pub fn apply_operations(grid: &[Vec<Cell>], ops: &[EditOperation]) -> ApplyOutcome {
    let mut current: Grid = grid.to_vec();
    let mut errors = Vec::new();
    let mut applied = Vec::new();

    for raw in ops {
        let operation = match Operation::try_from(raw) {
            Ok(op) => op,
            Err(e @ OperationError::UnknownType(_)) => {
                errors.push(e.to_string());
                continue;
            }
            Err(e) => {
                errors.push(format!("Operation {} failed: {e}", raw.op_type));
                continue;
            }
        };

        let previous = operation.previous_value(&current);
        match operation.apply(&current) {
            Ok(next) => {
                current = next;
                applied.push(AppliedOperation {
                    operation,
                    previous,
                });
            }
            Err(e) => errors.push(format!("Operation {} failed: {e}", operation.kind())),
        }
    }

    ApplyOutcome {
        data: current,
        errors,
        applied,
    }
}

fn checked_index(index: i64, len: usize) -> Option<usize> {
    usize::try_from(index).ok().filter(|&i| i < len)
}

/// Inserts `row` at `position`, or appends when `position` is `None`.
/// Positions past the end append.
pub fn add_row(
    grid: &[Vec<Cell>],
    row: Vec<Cell>,
    position: Option<i64>,
) -> Result<Grid, OperationError> {
    let at = match position {
        None => grid.len(),
        Some(p) => usize::try_from(p)
            .map_err(|_| OperationError::InvalidRowIndex(p))?
            .min(grid.len()),
    };
    let mut next = grid.to_vec();
    next.insert(at, row);
    Ok(next)
}

pub fn remove_row(grid: &[Vec<Cell>], index: i64) -> Result<Grid, OperationError> {
    let at = checked_index(index, grid.len()).ok_or(OperationError::InvalidRowIndex(index))?;
    let mut next = grid.to_vec();
    next.remove(at);
    Ok(next)
}

/// Inserts a column. The header row receives `name`, every other row an
/// empty string. An empty grid becomes a single header cell.
pub fn add_column(
    grid: &[Vec<Cell>],
    name: &str,
    index: Option<i64>,
) -> Result<Grid, OperationError> {
    if grid.is_empty() {
        return Ok(vec![vec![Value::String(name.to_string())]]);
    }

    let at = match index {
        None => grid[0].len(),
        Some(i) => usize::try_from(i).map_err(|_| OperationError::InvalidColumnIndex(i))?,
    };

    Ok(grid
        .iter()
        .enumerate()
        .map(|(row_idx, row)| {
            let mut next = row.clone();
            let value = if row_idx == 0 {
                Value::String(name.to_string())
            } else {
                Value::String(String::new())
            };
            next.insert(at.min(next.len()), value);
            next
        })
        .collect())
}

/// Removes a column from every row. Bounds are checked against the header.
pub fn remove_column(grid: &[Vec<Cell>], index: i64) -> Result<Grid, OperationError> {
    if grid.is_empty() {
        return Ok(Vec::new());
    }
    let at =
        checked_index(index, grid[0].len()).ok_or(OperationError::InvalidColumnIndex(index))?;

    Ok(grid
        .iter()
        .map(|row| {
            let mut next = row.clone();
            if at < next.len() {
                next.remove(at);
            }
            next
        })
        .collect())
}

pub fn update_cell(
    grid: &[Vec<Cell>],
    row: i64,
    column: i64,
    value: Cell,
) -> Result<Grid, OperationError> {
    let r = checked_index(row, grid.len()).ok_or(OperationError::InvalidRowIndex(row))?;
    let c = checked_index(column, grid[r].len())
        .ok_or(OperationError::InvalidColumnIndex(column))?;

    let mut next = grid.to_vec();
    next[r][c] = value;
    Ok(next)
}

/// Replaces a whole row.
pub fn update_row(grid: &[Vec<Cell>], index: i64, row: Vec<Cell>) -> Result<Grid, OperationError> {
    let at = checked_index(index, grid.len()).ok_or(OperationError::InvalidRowIndex(index))?;
    let mut next = grid.to_vec();
    next[at] = row;
    Ok(next)
}

/// Inserts several rows starting at `start` (clamped to the end).
pub fn insert_rows(grid: &[Vec<Cell>], start: usize, rows: Vec<Vec<Cell>>) -> Grid {
    let at = start.min(grid.len());
    let mut next = grid.to_vec();
    next.splice(at..at, rows);
    next
}

/// Drops every row except the header.
pub fn clear_data(grid: &[Vec<Cell>]) -> Grid {
    grid.iter().take(1).cloned().collect()
}

/// Position of the header named `name`.
pub fn column_index(grid: &[Vec<Cell>], name: &str) -> Option<usize> {
    grid.first()?
        .iter()
        .position(|h| h.as_str() == Some(name))
}

/// Header text of column `index`, or an empty string when out of range.
pub fn column_name(grid: &[Vec<Cell>], index: i64) -> String {
    grid.first()
        .and_then(|header| checked_index(index, header.len()).map(|i| &header[i]))
        .map(cell_text)
        .unwrap_or_default()
}

pub fn get_row(grid: &[Vec<Cell>], index: i64) -> Result<&[Cell], OperationError> {
    checked_index(index, grid.len())
        .map(|i| grid[i].as_slice())
        .ok_or(OperationError::InvalidRowIndex(index))
}

pub fn get_cell(grid: &[Vec<Cell>], row: i64, column: i64) -> Result<&Cell, OperationError> {
    let cells = get_row(grid, row)?;
    checked_index(column, cells.len())
        .map(|c| &cells[c])
        .ok_or(OperationError::InvalidColumnIndex(column))
}

/// Display text of a cell: strings unquoted, null as empty.
pub fn cell_text(cell: &Cell) -> String {
    match cell {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid() -> Grid {
        vec![
            vec![json!("Name"), json!("Grade")],
            vec![json!("Ada"), json!(92)],
            vec![json!("Linus"), json!(85)],
        ]
    }

    fn op(value: serde_json::Value) -> EditOperation {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_zero_operations_returns_input_unchanged() {
        let out = apply_operations(&grid(), &[]);
        assert_eq!(out.data, grid());
        assert!(out.errors.is_empty());
        assert!(out.applied.is_empty());
    }

    #[test]
    fn test_update_cell_touches_exactly_one_cell() {
        let before = grid();
        let after = update_cell(&before, 2, 1, json!(90)).unwrap();
        for (r, row) in after.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                if (r, c) == (2, 1) {
                    assert_eq!(cell, &json!(90));
                } else {
                    assert_eq!(cell, &before[r][c]);
                }
            }
        }
    }

    #[test]
    fn test_add_row_grows_by_one_and_preserves_rows() {
        let before = grid();
        let after = add_row(&before, vec![json!("Grace"), json!(99)], None).unwrap();
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(&after[..before.len()], &before[..]);
        assert_eq!(after[3], vec![json!("Grace"), json!(99)]);
    }

    #[test]
    fn test_add_row_at_index_shifts_following_rows() {
        let after = add_row(&grid(), vec![json!("Grace"), json!(99)], Some(1)).unwrap();
        assert_eq!(after[1][0], json!("Grace"));
        assert_eq!(after[2][0], json!("Ada"));
    }

    #[test]
    fn test_add_row_past_end_appends() {
        let after = add_row(&grid(), vec![json!("x"), json!(1)], Some(40)).unwrap();
        assert_eq!(after.len(), 4);
        assert_eq!(after[3][0], json!("x"));
    }

    #[test]
    fn test_add_row_negative_index_rejected() {
        assert_eq!(
            add_row(&grid(), vec![], Some(-1)),
            Err(OperationError::InvalidRowIndex(-1))
        );
    }

    #[test]
    fn test_add_column_grows_by_one_and_preserves_cells() {
        let before = grid();
        let after = add_column(&before, "Notes", None).unwrap();
        assert_eq!(after.len(), before.len());
        for (r, row) in after.iter().enumerate() {
            assert_eq!(row.len(), before[r].len() + 1);
            assert_eq!(&row[..before[r].len()], &before[r][..]);
        }
        assert_eq!(after[0][2], json!("Notes"));
        assert_eq!(after[1][2], json!(""));
    }

    #[test]
    fn test_add_column_at_zero_is_honored() {
        let after = add_column(&grid(), "Id", Some(0)).unwrap();
        assert_eq!(after[0], vec![json!("Id"), json!("Name"), json!("Grade")]);
        assert_eq!(after[1][1], json!("Ada"));
    }

    #[test]
    fn test_add_column_to_empty_grid() {
        assert_eq!(add_column(&[], "First", Some(3)).unwrap(), vec![vec![json!("First")]]);
    }

    #[test]
    fn test_remove_row_out_of_range() {
        assert_eq!(remove_row(&grid(), 3), Err(OperationError::InvalidRowIndex(3)));
        assert_eq!(remove_row(&grid(), -2), Err(OperationError::InvalidRowIndex(-2)));
    }

    #[test]
    fn test_remove_column() {
        let after = remove_column(&grid(), 0).unwrap();
        assert_eq!(after, vec![vec![json!("Grade")], vec![json!(92)], vec![json!(85)]]);
        assert_eq!(
            remove_column(&grid(), 2),
            Err(OperationError::InvalidColumnIndex(2))
        );
        assert!(remove_column(&[], 0).unwrap().is_empty());
    }

    #[test]
    fn test_update_cell_bounds() {
        assert_eq!(
            update_cell(&grid(), 5, 0, json!(1)),
            Err(OperationError::InvalidRowIndex(5))
        );
        assert_eq!(
            update_cell(&grid(), 1, 2, json!(1)),
            Err(OperationError::InvalidColumnIndex(2))
        );
    }

    #[test]
    fn test_clear_data_keeps_header() {
        assert_eq!(clear_data(&grid()), vec![grid()[0].clone()]);
        assert!(clear_data(&[]).is_empty());
    }

    #[test]
    fn test_update_row_and_insert_rows() {
        let after = update_row(&grid(), 1, vec![json!("Ada L."), json!(95)]).unwrap();
        assert_eq!(after[1][0], json!("Ada L."));

        let after = insert_rows(&grid(), 1, vec![vec![json!("a"), json!(1)], vec![json!("b"), json!(2)]]);
        assert_eq!(after.len(), 5);
        assert_eq!(after[2][0], json!("b"));
        assert_eq!(after[3][0], json!("Ada"));
    }

    #[test]
    fn test_lookup_helpers() {
        let g = grid();
        assert_eq!(column_index(&g, "Grade"), Some(1));
        assert_eq!(column_index(&g, "Missing"), None);
        assert_eq!(column_name(&g, 0), "Name");
        assert_eq!(column_name(&g, 9), "");
        assert_eq!(get_cell(&g, 2, 1).unwrap(), &json!(85));
        assert_eq!(get_row(&g, 7), Err(OperationError::InvalidRowIndex(7)));
    }

    #[test]
    fn test_apply_collects_errors_and_continues() {
        let ops = vec![
            op(json!({"type": "remove_row", "rowIndex": 10})),
            op(json!({"type": "update_cell", "rowIndex": 1, "columnIndex": 1, "cellValue": 100})),
            op(json!({"type": "add_row"})),
            op(json!({"type": "rename_sheet"})),
        ];
        let out = apply_operations(&grid(), &ops);

        assert_eq!(out.data[1][1], json!(100));
        assert_eq!(
            out.errors,
            vec![
                "Operation remove_row failed: Invalid row index: 10".to_string(),
                "Operation add_row failed: rowData is required for add_row".to_string(),
                "Unknown operation type: rename_sheet".to_string(),
            ]
        );
        assert_eq!(out.applied.len(), 1);
        assert_eq!(out.applied[0].previous, Some(json!(92)));
    }

    #[test]
    fn test_apply_update_cell_without_value_stores_null() {
        let ops = vec![op(json!({"type": "update_cell", "rowIndex": 1, "columnIndex": 0}))];
        assert_eq!(apply_operations(&grid(), &ops).data[1][0], Value::Null);
    }

    #[test]
    fn test_apply_add_column_requires_non_empty_name() {
        let ops = vec![op(json!({"type": "add_column", "columnName": ""}))];
        let out = apply_operations(&grid(), &ops);
        assert_eq!(out.data, grid());
        assert_eq!(
            out.errors,
            vec!["Operation add_column failed: columnName is required for add_column".to_string()]
        );
    }

    #[test]
    fn test_apply_position_start_without_index() {
        let ops = vec![op(json!({"type": "add_column", "columnName": "Id", "position": "start"}))];
        let out = apply_operations(&grid(), &ops);
        assert_eq!(out.data[0][0], json!("Id"));
    }

    #[test]
    fn test_apply_records_removed_row() {
        let ops = vec![op(json!({"type": "remove_row", "rowIndex": 2}))];
        let out = apply_operations(&grid(), &ops);
        assert_eq!(out.applied[0].previous, Some(json!(["Linus", 85])));
        assert_eq!(out.data.len(), 2);
    }

    #[test]
    fn test_apply_update_row_records_previous() {
        let ops = vec![op(json!({ "type": "update_row", "rowIndex": 2, "rowData": ["Linus T.", 88] }))];
        let out = apply_operations(&grid(), &ops);
        assert!(out.errors.is_empty());
        assert_eq!(out.data[2], vec![json!("Linus T."), json!(88)]);
        assert_eq!(out.applied[0].previous, Some(json!(["Linus", 85])));
    }

    #[test]
    fn test_edit_operation_deserializes_camel_case() {
        let parsed = op(json!({
            "type": "add_row",
            "rowIndex": 1,
            "rowData": ["a", 1, null]
        }));
        assert_eq!(parsed.op_type, "add_row");
        assert_eq!(parsed.row_index, Some(1));
        assert_eq!(parsed.row_data.unwrap().len(), 3);
    }
}
