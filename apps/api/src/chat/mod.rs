//! Tutoring conversations: prompt assembly, history and persistence.

pub mod handlers;
pub mod memory;
pub mod store;
pub mod web_context;

use serde::{Deserialize, Serialize};

use crate::attachments::AttachmentType;
use crate::chat::web_context::WebContext;
use crate::llm_client::prompts::{
    tool_context, ATTACHMENT_PREAMBLE, UNIVERSAL_TOOL, UNIVERSAL_TOOL_CONTEXT,
};
use crate::llm_client::ChatMessage;
use crate::models::chat::ChatMessageRow;
use crate::tools::catalog::find_tool;

/// Messages of context sent with each new prompt.
pub const HISTORY_LIMIT: i64 = 20;
const TITLE_MAX_CHARS: usize = 60;

/// Attachment as referenced from a chat message, normally the response of
/// `POST /api/attachments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub name: String,
    pub key: String,
    #[serde(rename = "type", default)]
    pub kind: AttachmentType,
    #[serde(default)]
    pub extracted_text: Option<String>,
}

/// Session title derived from the first prompt: first line, whitespace
/// collapsed, cut at a character boundary.
pub fn session_title(prompt: &str) -> String {
    let first_line = prompt.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let collapsed = first_line.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return "New chat".to_string();
    }
    if collapsed.chars().count() <= TITLE_MAX_CHARS {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}…", cut.trim_end())
}

/// Rows arrive newest first; the model wants them oldest first.
pub fn build_history(rows_newest_first: &[ChatMessageRow]) -> Vec<ChatMessage> {
    rows_newest_first
        .iter()
        .rev()
        .flat_map(|row| {
            [
                ChatMessage::user(row.prompt.clone()),
                ChatMessage::assistant(row.response.clone()),
            ]
        })
        .collect()
}

/// Instructions for the active tool. A catalog id is shown by its display
/// name; no tool, or the universal one, gives the open-ended instructions.
pub fn tool_instructions(tool: Option<&str>) -> String {
    match tool.map(str::trim).filter(|t| !t.is_empty() && *t != UNIVERSAL_TOOL) {
        Some(tool) => tool_context(find_tool(tool).map_or(tool, |t| t.name)),
        None => UNIVERSAL_TOOL_CONTEXT.to_string(),
    }
}

/// Prompt text with extracted attachment text inlined.
fn with_documents(prompt: &str, attachments: &[AttachmentRef]) -> String {
    let documents: Vec<String> = attachments
        .iter()
        .filter_map(|a| {
            let text = a.extracted_text.as_deref()?.trim();
            (!text.is_empty()).then(|| format!("--- {} ---\n{text}", a.name))
        })
        .collect();

    if documents.is_empty() {
        return prompt.to_string();
    }
    format!(
        "{ATTACHMENT_PREAMBLE}\n\n{}\n\n{prompt}",
        documents.join("\n\n")
    )
}

/// The user turn sent to the model: tool instructions, then the prompt with
/// attachments and any web results.
pub fn build_user_prompt(
    prompt: &str,
    tool: Option<&str>,
    attachments: &[AttachmentRef],
    web: Option<&WebContext>,
) -> String {
    let mut enhanced = with_documents(prompt, attachments);
    if let Some(web) = web {
        enhanced.push_str(&web.render());
    }
    format!("Context: {}. User Prompt: {enhanced}", tool_instructions(tool))
}
