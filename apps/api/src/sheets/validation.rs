use serde::{Deserialize, Serialize};

use crate::sheets::operations::Cell;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Checks that a grid is storable: at least one row, a non-empty header,
/// and every row as wide as the header.
pub fn validate_data(grid: &[Vec<Cell>]) -> ValidationResult {
    let Some(header) = grid.first() else {
        return ValidationResult {
            valid: false,
            errors: vec!["Data cannot be empty".to_string()],
        };
    };

    let mut errors = Vec::new();
    if header.is_empty() {
        errors.push("Header row cannot be empty".to_string());
    }

    let expected = header.len();
    for (i, row) in grid.iter().enumerate().skip(1) {
        if row.len() != expected {
            errors.push(format!(
                "Row {i} has {} columns, expected {expected}",
                row.len()
            ));
        }
    }

    ValidationResult {
        valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rectangular_grid_is_valid() {
        let grid = vec![vec![json!("a"), json!("b")], vec![json!(1), json!(2)]];
        let r = validate_data(&grid);
        assert!(r.valid);
        assert!(r.errors.is_empty());
    }

    #[test]
    fn test_header_only_is_valid() {
        assert!(validate_data(&[vec![json!("a")]]).valid);
    }

    #[test]
    fn test_empty_grid_rejected() {
        let r = validate_data(&[]);
        assert!(!r.valid);
        assert_eq!(r.errors, vec!["Data cannot be empty"]);
    }

    #[test]
    fn test_empty_header_rejected() {
        let r = validate_data(&[vec![]]);
        assert!(!r.valid);
        assert_eq!(r.errors, vec!["Header row cannot be empty"]);
    }

    #[test]
    fn test_ragged_rows_reported_individually() {
        let grid = vec![
            vec![json!("a"), json!("b")],
            vec![json!(1)],
            vec![json!(1), json!(2)],
            vec![json!(1), json!(2), json!(3)],
        ];
        let r = validate_data(&grid);
        assert!(!r.valid);
        assert_eq!(
            r.errors,
            vec![
                "Row 1 has 1 columns, expected 2",
                "Row 3 has 3 columns, expected 2",
            ]
        );
    }
}
