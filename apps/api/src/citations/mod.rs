//! Academic citation formatting for web search sources.

pub mod handlers;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationSource {
    pub title: String,
    pub url: String,
    pub source: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CitationFormat {
    #[default]
    Apa,
    Mla,
    Chicago,
}

impl CitationFormat {
    pub fn display_name(self) -> &'static str {
        match self {
            CitationFormat::Apa => "APA (7th Edition)",
            CitationFormat::Mla => "MLA (9th Edition)",
            CitationFormat::Chicago => "Chicago (17th Edition)",
        }
    }
}

pub const CITATION_FORMATS: [CitationFormat; 3] =
    [CitationFormat::Apa, CitationFormat::Mla, CitationFormat::Chicago];

/// Formats one source. `today` stands in for a missing or unreadable date.
pub fn format_citation(source: &CitationSource, format: CitationFormat, today: NaiveDate) -> String {
    let date = source
        .date
        .as_deref()
        .and_then(parse_date)
        .unwrap_or(today);
    let author = source
        .author
        .as_deref()
        .filter(|a| !a.trim().is_empty())
        .unwrap_or(source.source.as_str());

    match format {
        CitationFormat::Apa => format!(
            "{author}. ({}). {}. {}. {}",
            date.format("%Y, %B %-d"),
            source.title,
            source.source,
            source.url
        ),
        CitationFormat::Mla => format!(
            "{author}. \"{}.\" {}, {}, {}.",
            source.title,
            source.source,
            date.format("%b %-d, %Y"),
            source.url
        ),
        CitationFormat::Chicago => format!(
            "{author}. \"{}.\" {}. Last modified {}. {}.",
            source.title,
            source.source,
            date.format("%B %-d, %Y"),
            source.url
        ),
    }
}

/// Numbers each citation as `[n] ` and separates entries with a blank line.
pub fn format_bibliography(
    sources: &[CitationSource],
    format: CitationFormat,
    today: NaiveDate,
) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("[{}] {}", i + 1, format_citation(s, format, today)))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}
