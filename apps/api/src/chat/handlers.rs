//! Axum route handlers for the Chat API.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::memory::{recent_memories, spawn_extraction, system_with_memories};
use crate::chat::store::{
    create_session, delete_session, insert_message, list_sessions, load_session,
    recent_messages, session_messages, NewMessage,
};
use crate::chat::web_context::{
    optimize_search_query, recommended_search_type, resolve_web_search, WebContext,
};
use crate::chat::{build_history, build_user_prompt, session_title, AttachmentRef};
use crate::errors::AppError;
use crate::llm_client::prompts::TERA_SYSTEM;
use crate::llm_client::ChatMessage;
use crate::models::chat::{ChatMessageRow, ChatSessionRow};
use crate::models::user::UserIdQuery;
use crate::search::cached_search;
use crate::search::client::{SearchQuery, SearchResult};
use crate::search::history::record_search;
use crate::state::AppState;
use crate::usage::counters::{ensure_can_chat, increment_chats, remaining_after_chat};
use crate::usage::plans::Limit;
use crate::usage::web_search::{consume_web_search, limit_message, web_search_remaining};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub prompt: String,
    pub tool: Option<String>,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    /// Forces live web results on or off. Unset lets the prompt decide.
    pub web_search: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub session_id: Uuid,
    pub message_id: Uuid,
    pub reply: String,
    pub remaining_chats: Limit,
    /// Web results the reply was grounded on.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct SessionsResponse {
    pub sessions: Vec<ChatSessionRow>,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub session: ChatSessionRow,
    pub messages: Vec<ChatMessageRow>,
}

/// POST /api/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let prompt = req.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::Validation("prompt cannot be empty".to_string()));
    }

    let counters = ensure_can_chat(&state.db, req.user_id).await?;

    let existing = match req.session_id {
        Some(id) => Some(
            load_session(&state.db, req.user_id, id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Chat session {id} not found")))?,
        ),
        None => None,
    };

    let mut messages: Vec<ChatMessage> = match &existing {
        Some(session) => build_history(&recent_messages(&state.db, session.id).await?),
        None => Vec::new(),
    };

    let web = if resolve_web_search(req.web_search, prompt) {
        Some(search_for_chat(&state, req.user_id, prompt).await?)
    } else {
        None
    };
    messages.push(ChatMessage::user(build_user_prompt(
        prompt,
        req.tool.as_deref(),
        &req.attachments,
        web.as_ref(),
    )));

    let memories = recent_memories(&state.db, req.user_id)
        .await
        .unwrap_or_else(|e| {
            warn!("Failed to load memories for user {}: {e}", req.user_id);
            Vec::new()
        });
    let system = system_with_memories(TERA_SYSTEM, &memories);

    let response = state
        .llm
        .chat(&messages, &system)
        .await
        .map_err(|e| AppError::Llm(format!("Chat completion failed: {e}")))?;
    let reply = response
        .text()
        .ok_or_else(|| AppError::Llm("Chat completion returned no text".to_string()))?
        .to_string();

    // The session is only created once the model has answered.
    let session = match existing {
        Some(session) => session,
        None => create_session(&state.db, req.user_id, &session_title(prompt)).await?,
    };

    let message = insert_message(
        &state.db,
        NewMessage {
            session_id: session.id,
            user_id: req.user_id,
            prompt,
            response: &reply,
            tool: req.tool.as_deref(),
            attachments: json!(req.attachments),
        },
    )
    .await?;

    increment_chats(&state.db, req.user_id).await?;
    info!(
        "Chat reply for user {} in session {} ({} history messages, {} memories)",
        req.user_id,
        session.id,
        messages.len() - 1,
        memories.len()
    );

    spawn_extraction(
        state.db.clone(),
        state.llm.clone(),
        req.user_id,
        prompt.to_string(),
        reply.clone(),
    );

    Ok(Json(ChatResponse {
        session_id: session.id,
        message_id: message.id,
        reply,
        remaining_chats: remaining_after_chat(&counters),
        sources: web.map(|w| w.sources().to_vec()).unwrap_or_default(),
    }))
}

/// Live results for one chat turn. An exhausted quota or a failing backend
/// is reported to the model instead of failing the chat.
async fn search_for_chat(state: &AppState, user_id: Uuid, prompt: &str) -> Result<WebContext, AppError> {
    let quota = web_search_remaining(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    if quota.remaining == 0 {
        return Ok(WebContext::Unavailable(limit_message(0, quota.total)));
    }

    let optimized = optimize_search_query(prompt);
    let text = if optimized.is_empty() { prompt } else { optimized.as_str() };
    let query = SearchQuery::new(text, None, None);
    info!(
        "Chat web search for user {user_id} ({:?}): {:?}",
        recommended_search_type(prompt),
        query.query
    );

    let results = match cached_search(state, &query).await {
        Ok((results, _cached)) => results,
        Err(e) => return Ok(WebContext::Unavailable(e.to_string())),
    };

    consume_web_search(&state.db, user_id).await?;
    let filters = json!({ "lang": query.lang, "limit": query.limit, "origin": "chat" });
    if let Err(e) = record_search(&state.db, user_id, &query.query, results.len(), filters).await {
        warn!("Failed to record search history for user {user_id}: {e}");
    }

    Ok(WebContext::from_results(results))
}

/// GET /api/chat/sessions
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<SessionsResponse>, AppError> {
    let sessions = list_sessions(&state.db, params.user_id).await?;
    Ok(Json(SessionsResponse { sessions }))
}

/// GET /api/chat/sessions/:id/messages
pub async fn handle_session_messages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<MessagesResponse>, AppError> {
    let session = load_session(&state.db, params.user_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Chat session {id} not found")))?;
    let messages = session_messages(&state.db, session.id).await?;
    Ok(Json(MessagesResponse { session, messages }))
}

/// DELETE /api/chat/sessions/:id
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !delete_session(&state.db, params.user_id, id).await? {
        return Err(AppError::NotFound(format!("Chat session {id} not found")));
    }
    info!("Deleted chat session {id}");
    Ok(Json(json!({ "success": true })))
}
