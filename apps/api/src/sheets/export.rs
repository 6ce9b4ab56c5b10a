use anyhow::{Context, Result};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::sheets::operations::{cell_text, Cell};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Tsv,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Tsv => "tsv",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Tsv => "text/tab-separated-values; charset=utf-8",
            ExportFormat::Json => "application/json; charset=utf-8",
        }
    }
}

pub fn export(grid: &[Vec<Cell>], format: ExportFormat, title: &str) -> Result<String> {
    match format {
        ExportFormat::Csv => to_csv(grid),
        ExportFormat::Tsv => to_tsv(grid),
        ExportFormat::Json => Ok(to_json(grid, title)),
    }
}

/// Comma-separated export. Fields are quoted only when they contain a
/// delimiter, quote or newline.
pub fn to_csv(grid: &[Vec<Cell>]) -> Result<String> {
    write_delimited(grid, b',', |c| cell_text(c))
}

/// Tab-separated export. Tabs inside cells become spaces.
pub fn to_tsv(grid: &[Vec<Cell>]) -> Result<String> {
    write_delimited(grid, b'\t', |c| cell_text(c).replace('\t', " "))
}

fn write_delimited<F>(grid: &[Vec<Cell>], delimiter: u8, render: F) -> Result<String>
where
    F: Fn(&Cell) -> String,
{
    // Stored grids are not guaranteed rectangular.
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .terminator(csv::Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());

    for row in grid {
        let record: Vec<String> = row.iter().map(&render).collect();
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("CSV flush failed: {e}"))?;
    let mut text = String::from_utf8(bytes).context("export produced invalid UTF-8")?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

/// JSON export: one object per data row keyed by header text.
pub fn to_json(grid: &[Vec<Cell>], title: &str) -> String {
    let Some(header) = grid.first() else {
        return "{}".to_string();
    };
    let headers: Vec<String> = header.iter().map(cell_text).collect();
    let rows = &grid[1..];

    let data: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut obj = Map::new();
            for (idx, name) in headers.iter().enumerate() {
                obj.insert(name.clone(), row.get(idx).cloned().unwrap_or(Value::Null));
            }
            Value::Object(obj)
        })
        .collect();

    let output = json!({
        "title": title,
        "headers": header,
        "rowCount": rows.len(),
        "columnCount": header.len(),
        "data": data,
        "exportedAt": Utc::now().to_rfc3339(),
    });

    serde_json::to_string_pretty(&output).unwrap_or_else(|_| "{}".to_string())
}
