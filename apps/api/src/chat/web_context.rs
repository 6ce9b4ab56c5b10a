//! Live web results for chat: deciding when a prompt needs them and how they
//! are shown to the model.

use std::sync::LazyLock;

use regex::Regex;

use crate::search::client::SearchResult;

const REAL_TIME_KEYWORDS: &[&str] = &[
    "latest", "recent", "today", "yesterday", "this week", "this month", "current", "now",
    "breaking", "just", "new", "updated", "2024", "2025", "2026", "2027", "news", "headlines",
    "update", "announced", "released", "launched", "price", "stock", "crypto", "bitcoin",
    "ethereum", "market", "trading", "exchange rate", "currency", "weather", "forecast",
    "temperature", "score", "game", "match", "results", "standings", "winner", "box office",
    "trending", "viral", "research", "study", "statistics", "data", "report", "how many",
    "what is the", "who is the", "where is", "review", "comparison", "vs", "versus", "compare",
    "best", "top", "ranking", "rated",
];

const REAL_TIME_PHRASES: &[&str] = &[
    "what happened",
    "is it true",
    "did they",
    "has there been",
    "any updates on",
    "latest on",
    "news about",
    "what's new",
    "status of",
    "current state",
    "right now",
    "at the moment",
    "as of today",
    "this year",
    "last year",
];

const EVENT_KEYWORDS: &[&str] = &["president", "ceo", "leader", "champion", "winner", "trending"];
const NEWS_KEYWORDS: &[&str] = &[
    "news", "breaking", "headlines", "announced", "released", "update", "latest",
];
const ACADEMIC_KEYWORDS: &[&str] = &[
    "research", "study", "paper", "journal", "scientific", "academic", "thesis",
];

const FILLER_PHRASES: &[&str] = &[
    "please", "can you", "could you", "would you", "i want to know", "tell me", "show me",
    "find me", "help me", "i need", "what about", "regarding", "concerning", "about the",
];

/// Shortest prompt, after trimming, that can trigger a search.
const MIN_QUERY_CHARS: usize = 5;

const RESULTS_RULE: &str = "════════════════════════════════════════════════════════════════════════════════";

static KNOWLEDGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(what is|define|explain|describe) (a |an |the )?(concept|theory|principle|law|rule)",
        r"^(how to|how do (i|you)|steps to|tutorial)",
        r"^(teach me|help me understand|explain to me)",
        r"^(create|generate|write|make) (a |an )?(code|program|script|function)",
        r"^(solve|calculate|compute|evaluate)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("knowledge pattern is valid"))
    .collect()
});

static QUESTION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"^(who|what|when|where|why|how) (is|are|was|were|did|does|do|has|have|will)",
        r"\?$",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("question pattern is valid"))
    .collect()
});

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| text.contains(n))
}

/// Whether a prompt asks about something that changes over time.
///
/// Matching is plain substring matching on the lower-cased prompt, so
/// short keywords such as `now` also hit inside longer words.
pub fn should_enable_web_search(query: &str) -> bool {
    let normalized = query.trim().to_lowercase();
    if normalized.chars().count() < MIN_QUERY_CHARS {
        return false;
    }

    let has_time_keyword = contains_any(&normalized, REAL_TIME_KEYWORDS);

    // Teaching and problem-solving requests stay offline unless they
    // mention something time-bound.
    if !has_time_keyword && KNOWLEDGE_PATTERNS.iter().any(|p| p.is_match(&normalized)) {
        return false;
    }
    if has_time_keyword || contains_any(&normalized, REAL_TIME_PHRASES) {
        return true;
    }

    QUESTION_PATTERNS.iter().any(|p| p.is_match(&normalized))
        && contains_any(&normalized, EVENT_KEYWORDS)
}

/// An explicit choice from the client wins; otherwise the prompt decides.
pub fn resolve_web_search(explicit: Option<bool>, prompt: &str) -> bool {
    explicit.unwrap_or_else(|| should_enable_web_search(prompt))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    News,
    Academic,
    General,
    None,
}

pub fn recommended_search_type(query: &str) -> SearchType {
    let normalized = query.trim().to_lowercase();
    if contains_any(&normalized, NEWS_KEYWORDS) {
        SearchType::News
    } else if contains_any(&normalized, ACADEMIC_KEYWORDS) {
        SearchType::Academic
    } else if should_enable_web_search(query) {
        SearchType::General
    } else {
        SearchType::None
    }
}

/// Lower-cases the prompt and drops conversational filler so the search
/// engine sees the key terms.
pub fn optimize_search_query(query: &str) -> String {
    let mut optimized = query.trim().to_lowercase();
    for filler in FILLER_PHRASES {
        optimized = optimized.replace(filler, " ");
    }
    optimized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Outcome of the search run for one chat turn.
#[derive(Debug, Clone, PartialEq)]
pub enum WebContext {
    Results(Vec<SearchResult>),
    Unavailable(String),
    Empty,
}

impl WebContext {
    pub fn from_results(results: Vec<SearchResult>) -> Self {
        if results.is_empty() {
            Self::Empty
        } else {
            Self::Results(results)
        }
    }

    /// Text appended to the user prompt.
    pub fn render(&self) -> String {
        match self {
            Self::Results(results) => {
                let body = results
                    .iter()
                    .enumerate()
                    .map(|(i, r)| {
                        format!(
                            "[Result {}]\nTitle: {}\nSource: {}\nURL: {}\nContent: {}",
                            i + 1,
                            r.title,
                            r.source,
                            r.url,
                            r.snippet
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n\n");
                format!(
                    "\n\n📊 LIVE WEB SEARCH RESULTS (Real-time data from the internet):\n\
                     {RESULTS_RULE}\n\n{body}\n\n{RESULTS_RULE}\n"
                )
            }
            Self::Unavailable(message) => format!(
                "\n\n⚠️ Web search unavailable: {message}\nFalling back to training knowledge.\n"
            ),
            Self::Empty => "\n\n⚠️ No web search results found for this query. \
                            Using training knowledge instead.\n"
                .to_string(),
        }
    }

    /// Results the reply can cite.
    pub fn sources(&self) -> &[SearchResult] {
        match self {
            Self::Results(results) => results,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(title: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: "https://example.com/a".to_string(),
            snippet: "Snippet".to_string(),
            source: "example.com".to_string(),
            favicon: None,
        }
    }

    #[test]
    fn test_real_time_prompts_enable_search() {
        assert!(should_enable_web_search("Latest news on the Mars rover"));
        assert!(should_enable_web_search("bitcoin price"));
        assert!(should_enable_web_search("What happened in Paris?"));
        assert!(should_enable_web_search("Who is the current CEO of Mistral"));
    }

    #[test]
    fn test_knowledge_prompts_stay_offline() {
        assert!(!should_enable_web_search("Explain the concept of osmosis"));
        assert!(!should_enable_web_search("Solve 2x + 3 = 7"));
        assert!(!should_enable_web_search("Teach me photosynthesis"));
        assert!(!should_enable_web_search("hi"));
        assert!(!should_enable_web_search("    what    "));
    }

    #[test]
    fn test_knowledge_prompt_with_time_keyword_searches() {
        assert!(should_enable_web_search("Explain the theory behind today's eclipse"));
    }

    #[test]
    fn test_event_questions_search() {
        assert!(should_enable_web_search("Who was the champion in 1998?"));
        assert!(!should_enable_web_search("Why is the sky blue?"));
    }

    #[test]
    fn test_explicit_choice_overrides_detection() {
        assert!(resolve_web_search(None, "bitcoin price"));
        assert!(!resolve_web_search(Some(false), "bitcoin price"));
        assert!(resolve_web_search(Some(true), "Teach me photosynthesis"));
        assert!(!resolve_web_search(None, "Teach me photosynthesis"));
    }

    #[test]
    fn test_recommended_search_type() {
        assert_eq!(recommended_search_type("breaking headlines"), SearchType::News);
        assert_eq!(recommended_search_type("a journal paper on sleep"), SearchType::Academic);
        assert_eq!(recommended_search_type("bitcoin price"), SearchType::General);
        assert_eq!(recommended_search_type("Solve 2x + 3 = 7"), SearchType::None);
    }

    #[test]
    fn test_optimize_search_query_drops_filler() {
        assert_eq!(
            optimize_search_query("Please tell me   the Bitcoin price"),
            "the bitcoin price"
        );
        assert_eq!(optimize_search_query("Can you find me news regarding NASA"), "news nasa");
    }

    #[test]
    fn test_results_render_numbered_block() {
        let ctx = WebContext::from_results(vec![result("One"), result("Two")]);
        let text = ctx.render();
        assert!(text.starts_with("\n\n📊 LIVE WEB SEARCH RESULTS"));
        assert!(text.contains("[Result 1]\nTitle: One\nSource: example.com\nURL: https://example.com/a\nContent: Snippet"));
        assert!(text.contains("\n\n[Result 2]\nTitle: Two"));
        assert_eq!(text.matches(RESULTS_RULE).count(), 2);
        assert_eq!(ctx.sources().len(), 2);
    }

    #[test]
    fn test_empty_and_failed_searches_fall_back() {
        let empty = WebContext::from_results(Vec::new());
        assert_eq!(empty, WebContext::Empty);
        assert!(empty.render().contains("No web search results found"));
        assert!(empty.sources().is_empty());

        let failed = WebContext::Unavailable("timeout".to_string());
        assert!(failed
            .render()
            .contains("Web search unavailable: timeout\nFalling back to training knowledge."));
    }
}
