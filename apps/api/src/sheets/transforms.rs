use std::cmp::Ordering;

use serde::Serialize;

use crate::sheets::operations::{cell_text, Cell, Grid};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetStats {
    pub rows: usize,
    pub columns: usize,
    pub headers: Vec<Cell>,
    /// Rows excluding the header.
    pub data_rows: usize,
}

pub fn stats(grid: &[Vec<Cell>]) -> SheetStats {
    let headers = grid.first().cloned().unwrap_or_default();
    SheetStats {
        rows: grid.len(),
        columns: headers.len(),
        headers,
        data_rows: grid.len().saturating_sub(1),
    }
}

/// Replaces every cell equal to `find` with `replace`, optionally only in
/// one column. The header row is included. Returns the new grid and the
/// number of replaced cells.
pub fn find_replace(
    grid: &[Vec<Cell>],
    find: &Cell,
    replace: &Cell,
    in_column: Option<usize>,
) -> (Grid, usize) {
    let mut replaced = 0;
    let next: Grid = grid
        .iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .map(|(c, cell)| {
                    let in_scope = in_column.map_or(true, |col| col == c);
                    if in_scope && cell == find {
                        replaced += 1;
                        replace.clone()
                    } else {
                        cell.clone()
                    }
                })
                .collect::<Vec<_>>()
        })
        .collect();
    (next, replaced)
}

/// Sorts data rows by one column, keeping the header first.
/// Two numbers compare numerically; anything else compares as lower-cased
/// text. Equal keys keep their original order.
pub fn sort_by_column(grid: &[Vec<Cell>], column: usize, descending: bool) -> Grid {
    if grid.len() <= 1 {
        return grid.to_vec();
    }

    let mut rows: Grid = grid[1..].to_vec();
    rows.sort_by(|a, b| {
        let ord = compare_cells(a.get(column), b.get(column));
        if descending {
            ord.reverse()
        } else {
            ord
        }
    });

    let mut sorted = Vec::with_capacity(grid.len());
    sorted.push(grid[0].clone());
    sorted.extend(rows);
    sorted
}

fn compare_cells(a: Option<&Cell>, b: Option<&Cell>) -> Ordering {
    match (a.and_then(Cell::as_f64), b.and_then(Cell::as_f64)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => {
            let x = a.map(cell_text).unwrap_or_default().to_lowercase();
            let y = b.map(cell_text).unwrap_or_default().to_lowercase();
            x.cmp(&y)
        }
    }
}

/// Keeps the header plus every data row whose cell in `column` satisfies
/// `predicate`. Rows too short to have that column see `None`.
pub fn filter_rows<F>(grid: &[Vec<Cell>], column: usize, predicate: F) -> Grid
where
    F: Fn(Option<&Cell>) -> bool,
{
    if grid.len() <= 1 {
        return grid.to_vec();
    }

    std::iter::once(grid[0].clone())
        .chain(
            grid[1..]
                .iter()
                .filter(|row| predicate(row.get(column)))
                .cloned(),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn grid() -> Grid {
        vec![
            vec![json!("Name"), json!("Score"), json!("Group")],
            vec![json!("bob"), json!(7), json!("B")],
            vec![json!("Alice"), json!(12), json!("A")],
            vec![json!("carol"), json!(7), json!("A")],
        ]
    }

    #[test]
    fn test_stats() {
        let s = stats(&grid());
        assert_eq!(s.rows, 4);
        assert_eq!(s.columns, 3);
        assert_eq!(s.data_rows, 3);
        assert_eq!(s.headers[0], json!("Name"));

        let empty = stats(&[]);
        assert_eq!(empty.rows, 0);
        assert_eq!(empty.columns, 0);
        assert_eq!(empty.data_rows, 0);
    }

    #[test]
    fn test_find_replace_everywhere() {
        let (next, n) = find_replace(&grid(), &json!("A"), &json!("Alpha"), None);
        assert_eq!(n, 2);
        assert_eq!(next[2][2], json!("Alpha"));
        assert_eq!(next[3][2], json!("Alpha"));
    }

    #[test]
    fn test_find_replace_is_strict_about_type() {
        let (_, n) = find_replace(&grid(), &json!("7"), &json!(0), None);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_find_replace_single_column() {
        let (next, n) = find_replace(&grid(), &json!(7), &json!(8), Some(0));
        assert_eq!(n, 0);
        assert_eq!(next, grid());
    }

    #[test]
    fn test_sort_numeric_ascending_is_stable() {
        let sorted = sort_by_column(&grid(), 1, false);
        assert_eq!(sorted[0][0], json!("Name"));
        let names: Vec<_> = sorted[1..].iter().map(|r| r[0].clone()).collect();
        assert_eq!(names, vec![json!("bob"), json!("carol"), json!("Alice")]);
    }

    #[test]
    fn test_sort_text_case_insensitive_descending() {
        let sorted = sort_by_column(&grid(), 0, true);
        let names: Vec<_> = sorted[1..].iter().map(|r| r[0].clone()).collect();
        assert_eq!(names, vec![json!("carol"), json!("bob"), json!("Alice")]);
    }

    #[test]
    fn test_sort_header_only_untouched() {
        let header_only = vec![grid()[0].clone()];
        assert_eq!(sort_by_column(&header_only, 0, false), header_only);
    }

    #[test]
    fn test_filter_rows_keeps_header() {
        let filtered = filter_rows(&grid(), 2, |cell| cell == Some(&json!("A")));
        assert_eq!(filtered.len(), 3);
        assert_eq!(filtered[0][0], json!("Name"));
        assert_eq!(filtered[1][0], json!("Alice"));
    }
}
