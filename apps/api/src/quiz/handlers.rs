//! Axum route handlers for the Quiz API.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::llm_client::CompletionSettings;
use crate::models::learning::QuizResultRow;
use crate::models::user::UserIdQuery;
use crate::quiz::store::{all_results, history, save_result};
use crate::quiz::{
    build_quiz_prompt, clamp_question_count, grade_quiz, normalize_quiz, quiz_stats, Difficulty,
    Quiz, QuizAnswer, QuizGrading, QuizStats, QUIZ_SYSTEM,
};
use crate::state::AppState;
use crate::usage::counters::{ensure_can_chat, increment_chats};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQuizRequest {
    pub user_id: Uuid,
    pub topic: String,
    pub question_count: Option<u32>,
    #[serde(default)]
    pub difficulty: Difficulty,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeQuizRequest {
    pub user_id: Uuid,
    pub quiz: Quiz,
    #[serde(default)]
    pub answers: Vec<QuizAnswer>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    pub user_id: Uuid,
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub results: Vec<QuizResultRow>,
}

/// POST /api/quiz/generate
///
/// Counts as one chat against the daily limit.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(req): Json<GenerateQuizRequest>,
) -> Result<Json<Quiz>, AppError> {
    let topic = req.topic.trim();
    if topic.is_empty() {
        return Err(AppError::Validation("topic cannot be empty".to_string()));
    }
    ensure_can_chat(&state.db, req.user_id).await?;

    let count = clamp_question_count(req.question_count);
    let prompt = build_quiz_prompt(topic, count, req.difficulty);
    let raw: Quiz = state
        .llm
        .complete_json(CompletionSettings::QUIZ, &prompt, QUIZ_SYSTEM)
        .await
        .map_err(|e| AppError::Llm(format!("Quiz generation failed: {e}")))?;
    let quiz = normalize_quiz(raw, topic)
        .map_err(|e| AppError::Llm(format!("Generated quiz is unusable: {e}")))?;

    increment_chats(&state.db, req.user_id).await?;
    info!(
        "Generated {} question quiz on {:?} for user {}",
        quiz.questions.len(),
        quiz.topic,
        req.user_id
    );
    Ok(Json(quiz))
}

/// POST /api/quiz/grade
///
/// The grade is returned even if the result cannot be stored.
pub async fn handle_grade(
    State(state): State<AppState>,
    Json(req): Json<GradeQuizRequest>,
) -> Result<Json<QuizGrading>, AppError> {
    if req.quiz.questions.is_empty() {
        return Err(AppError::Validation("quiz has no questions".to_string()));
    }
    let grading = grade_quiz(&req.quiz, &req.answers);

    if let Err(e) = save_result(
        &state.db,
        req.user_id,
        req.quiz.topic.trim(),
        grading.score,
        grading.total,
    )
    .await
    {
        warn!("Failed to save quiz result for user {}: {e}", req.user_id);
    }

    Ok(Json(grading))
}

/// GET /api/quiz/history
pub async fn handle_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, AppError> {
    let topic = params.topic.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let results = history(&state.db, params.user_id, topic).await?;
    Ok(Json(HistoryResponse { results }))
}

/// GET /api/quiz/stats
pub async fn handle_stats(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> Result<Json<QuizStats>, AppError> {
    let results = all_results(&state.db, params.user_id).await?;
    Ok(Json(quiz_stats(&results)))
}
