//! Facts Tera remembers about a user across sessions.
//!
//! After each reply a small model pulls durable facts out of the exchange.
//! The most recent ones are added to the system prompt of later chats.

use anyhow::Result;
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::contains_pattern;
use crate::llm_client::prompts::{
    memory_extraction_prompt, MEMORY_CONTEXT_FOOTER, MEMORY_EXTRACTION_SYSTEM,
};
use crate::llm_client::{CompletionSettings, LlmClient};
use crate::models::learning::UserMemoryRow;

/// Memories injected into one system prompt.
pub const MEMORY_LIMIT: i64 = 50;
/// Length of the prefix used to spot an already stored fact.
const DEDUP_PREFIX_CHARS: usize = 20;
/// Reply text shown to the extraction model.
const EXTRACTION_RESPONSE_CHARS: usize = 500;
const NO_MEMORY: &str = "NO_MEMORY";

/// Bulleted list of memory texts, oldest first as stored.
pub fn format_memories(memories: &[String]) -> String {
    memories
        .iter()
        .map(|m| format!("- {m}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// `system` with the user's memories appended. Unchanged without memories.
pub fn system_with_memories(system: &str, memories: &[String]) -> String {
    if memories.is_empty() {
        return system.to_string();
    }
    format!(
        "{system}\n\n=== CONTEXT ABOUT THIS USER ===\n\nKEY FACTS YOU REMEMBER:\n{}\n\n{MEMORY_CONTEXT_FOOTER}",
        format_memories(memories)
    )
}

/// Facts from an extraction reply: one per `-` bullet, empty for `NO_MEMORY`.
pub fn parse_extracted_memories(reply: &str) -> Vec<String> {
    if reply.trim() == NO_MEMORY {
        return Vec::new();
    }
    reply
        .lines()
        .filter_map(|line| line.trim().strip_prefix('-'))
        .map(str::trim)
        .filter(|fact| !fact.is_empty() && *fact != NO_MEMORY)
        .map(str::to_string)
        .collect()
}

/// `ILIKE` pattern matching any stored memory that contains the first
/// characters of `memory`.
pub fn dedup_pattern(memory: &str) -> String {
    let prefix: String = memory.chars().take(DEDUP_PREFIX_CHARS).collect();
    contains_pattern(&prefix)
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((at, _)) => &text[..at],
        None => text,
    }
}

/// The most recent memory texts, oldest first.
pub async fn recent_memories(pool: &PgPool, user_id: Uuid) -> Result<Vec<String>> {
    let rows = sqlx::query_as::<_, UserMemoryRow>(
        r#"
        SELECT * FROM user_memories
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(MEMORY_LIMIT)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().rev().map(|r| r.memory_text).collect())
}

/// Stores a fact unless a similar one exists. Returns whether it was stored.
pub async fn save_memory(pool: &PgPool, user_id: Uuid, memory: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO user_memories (id, user_id, memory_text)
        SELECT $1, $2, $3
        WHERE NOT EXISTS (
            SELECT 1 FROM user_memories
            WHERE user_id = $2 AND memory_text ILIKE $4 ESCAPE '\'
        )
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(memory)
    .bind(dedup_pattern(memory))
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Asks the small model what is worth remembering from one exchange and
/// stores the new facts. Returns how many were stored.
pub async fn extract_memories(
    pool: &PgPool,
    llm: &LlmClient,
    user_id: Uuid,
    prompt: &str,
    response: &str,
) -> Result<usize> {
    let request = memory_extraction_prompt(
        prompt,
        truncate_chars(response, EXTRACTION_RESPONSE_CHARS),
    );
    let reply = llm
        .complete_with(CompletionSettings::MEMORY, &request, MEMORY_EXTRACTION_SYSTEM)
        .await?;

    let mut stored = 0;
    for fact in parse_extracted_memories(&reply) {
        if save_memory(pool, user_id, &fact).await? {
            stored += 1;
        }
    }
    debug!("Stored {stored} new memories for user {user_id}");
    Ok(stored)
}

/// Runs `extract_memories` in the background. Failures are logged only.
pub fn spawn_extraction(pool: PgPool, llm: LlmClient, user_id: Uuid, prompt: String, response: String) {
    tokio::spawn(async move {
        if let Err(e) = extract_memories(&pool, &llm, user_id, &prompt, &response).await {
            warn!("Memory extraction failed for user {user_id}: {e}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_without_memories_is_unchanged() {
        assert_eq!(system_with_memories("sys", &[]), "sys");
    }

    #[test]
    fn test_system_lists_memories() {
        let memories = vec![
            "User teaches 5th grade math".to_string(),
            "User prefers short answers".to_string(),
        ];
        let system = system_with_memories("sys", &memories);
        assert!(system.starts_with("sys\n\n=== CONTEXT ABOUT THIS USER ==="));
        assert!(system.contains(
            "KEY FACTS YOU REMEMBER:\n- User teaches 5th grade math\n- User prefers short answers\n\n=== END CONTEXT ==="
        ));
        assert!(system.ends_with("based on what you know about this user."));
    }

    #[test]
    fn test_parse_bullets() {
        let reply = "Here is what I found:\n- User is learning Spanish\n  -   Prepares for finals  \n* ignored\n-\n";
        assert_eq!(
            parse_extracted_memories(reply),
            vec!["User is learning Spanish", "Prepares for finals"]
        );
    }

    #[test]
    fn test_parse_no_memory() {
        assert!(parse_extracted_memories("NO_MEMORY").is_empty());
        assert!(parse_extracted_memories("  NO_MEMORY\n").is_empty());
        assert!(parse_extracted_memories("- NO_MEMORY").is_empty());
    }

    #[test]
    fn test_dedup_pattern_uses_escaped_prefix() {
        assert_eq!(
            dedup_pattern("User teaches 5th grade math daily"),
            "%User teaches 5th gra%"
        );
        assert_eq!(dedup_pattern("50% of_time"), "%50\\% of\\_time%");
        assert_eq!(dedup_pattern("ééé"), "%ééé%");
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 500), "hi");
    }
}
