//! Axum route handlers for the Tools API.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::prompts::TERA_SYSTEM;
use crate::state::AppState;
use crate::tools::catalog::{find_tool, Tool, TOOLS};
use crate::tools::prompts::build_tool_prompt;
use crate::usage::counters::{ensure_can_chat, increment_chats};

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub success: bool,
    pub data: &'static [Tool],
}

#[derive(Debug, Serialize)]
pub struct ToolResponse {
    pub success: bool,
    pub data: &'static Tool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessToolRequest {
    pub user_id: Uuid,
    pub input: Value,
    pub context: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessToolResponse {
    pub tool_id: &'static str,
    pub result: String,
    pub timestamp: DateTime<Utc>,
}

/// GET /api/tools
pub async fn handle_list_tools() -> Json<ToolListResponse> {
    Json(ToolListResponse {
        success: true,
        data: TOOLS,
    })
}

/// GET /api/tools/:id
pub async fn handle_get_tool(Path(id): Path<String>) -> Result<Json<ToolResponse>, AppError> {
    let tool = find_tool(&id).ok_or_else(|| AppError::NotFound("Tool not found".to_string()))?;
    Ok(Json(ToolResponse {
        success: true,
        data: tool,
    }))
}

/// POST /api/tools/:id/process
///
/// A tool run counts as one chat against the daily limit.
pub async fn handle_process_tool(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ProcessToolRequest>,
) -> Result<Json<ProcessToolResponse>, AppError> {
    let tool = find_tool(&id).ok_or_else(|| AppError::NotFound("Tool not found".to_string()))?;

    let empty_input = match &req.input {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    };
    if empty_input {
        return Err(AppError::Validation("input is required".to_string()));
    }

    ensure_can_chat(&state.db, req.user_id).await?;

    let prompt = build_tool_prompt(tool.kind, &req.input, req.context.as_deref());
    let result = state
        .llm
        .complete(&prompt, TERA_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Tool {} failed: {e}", tool.id)))?;

    increment_chats(&state.db, req.user_id).await?;
    info!("Processed tool {} for user {}", tool.id, req.user_id);

    Ok(Json(ProcessToolResponse {
        tool_id: tool.id,
        result,
        timestamp: Utc::now(),
    }))
}
