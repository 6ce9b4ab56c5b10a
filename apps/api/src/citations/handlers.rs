use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::citations::{format_bibliography, format_citation, CitationFormat, CitationSource};
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
pub struct CitationRequest {
    pub sources: Vec<CitationSource>,
    #[serde(default)]
    pub format: CitationFormat,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationResponse {
    pub format: CitationFormat,
    pub display_name: &'static str,
    pub citations: Vec<String>,
    pub bibliography: String,
}

/// POST /api/search/citations
pub async fn handle_citations(
    Json(req): Json<CitationRequest>,
) -> Result<Json<CitationResponse>, AppError> {
    if req.sources.is_empty() {
        return Err(AppError::Validation("sources cannot be empty".to_string()));
    }

    let today = Utc::now().date_naive();
    let citations = req
        .sources
        .iter()
        .map(|s| format_citation(s, req.format, today))
        .collect();

    Ok(Json(CitationResponse {
        format: req.format,
        display_name: req.format.display_name(),
        citations,
        bibliography: format_bibliography(&req.sources, req.format, today),
    }))
}
