//! Practice quizzes: generation prompt, grading and progress statistics.

pub mod handlers;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::models::learning::QuizResultRow;

pub const DEFAULT_QUESTION_COUNT: u32 = 5;
pub const MAX_QUESTION_COUNT: u32 = 20;
const TOP_TOPICS: usize = 5;
const NO_ANSWER: &str = "No answer provided";

pub const QUIZ_SYSTEM: &str =
    "You write clear, educational practice quizzes and reply with JSON only.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    fn description(self) -> &'static str {
        match self {
            Difficulty::Easy => "basic recall and simple concepts",
            Difficulty::Medium => "understanding and application of concepts",
            Difficulty::Hard => "analysis, synthesis, and complex problem-solving",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
}

/// An answer or answer key: an option index for choice questions, text
/// for short answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Index(i64),
    Text(String),
}

impl AnswerValue {
    fn as_text(&self) -> String {
        match self {
            AnswerValue::Index(i) => i.to_string(),
            AnswerValue::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: QuestionType,
    pub question: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    pub correct: AnswerValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(default)]
    pub topic: String,
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizAnswer {
    pub question_id: i64,
    pub answer: AnswerValue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionResult {
    pub question_id: i64,
    pub correct: bool,
    pub user_answer: AnswerValue,
    pub correct_answer: AnswerValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuizGrading {
    pub score: u32,
    pub total: u32,
    pub percentage: u32,
    pub results: Vec<QuestionResult>,
    pub feedback: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizStats {
    pub total_quizzes: usize,
    pub average_score: u32,
    pub top_topics: Vec<String>,
}

pub fn clamp_question_count(requested: Option<u32>) -> u32 {
    requested
        .unwrap_or(DEFAULT_QUESTION_COUNT)
        .clamp(1, MAX_QUESTION_COUNT)
}

pub fn build_quiz_prompt(topic: &str, count: u32, difficulty: Difficulty) -> String {
    format!(
        r#"Generate a quiz on the topic: "{topic}"

Create exactly {count} questions with {description}.

Mix of question types:
- Multiple choice (4 options each)
- True/False
- Short answer (1-3 word answers)

Return ONLY valid JSON in this exact format:
{{
  "action": "quiz",
  "topic": "{topic}",
  "questions": [
    {{
      "id": 1,
      "type": "multiple_choice",
      "question": "Your question here?",
      "options": ["Option A", "Option B", "Option C", "Option D"],
      "correct": 0,
      "explanation": "Brief explanation of why this is correct"
    }},
    {{
      "id": 2,
      "type": "true_false",
      "question": "Statement to evaluate as true or false?",
      "options": ["True", "False"],
      "correct": 0,
      "explanation": "Brief explanation"
    }},
    {{
      "id": 3,
      "type": "short_answer",
      "question": "Question requiring a short text answer?",
      "correct": "answer",
      "explanation": "Brief explanation"
    }}
  ]
}}

IMPORTANT:
- For multiple_choice: "correct" is the 0-based index of the correct option
- For true_false: "correct" is 0 for True, 1 for False
- For short_answer: "correct" is the expected answer string (lowercase)
- Always include an explanation for learning
- Make questions educational and clear"#,
        description = difficulty.description()
    )
}

/// Checks a generated quiz and fills in what the model may leave out.
pub fn normalize_quiz(mut quiz: Quiz, topic: &str) -> Result<Quiz, String> {
    if quiz.topic.trim().is_empty() {
        quiz.topic = topic.to_string();
    }
    if quiz.questions.is_empty() {
        return Err("quiz has no questions".to_string());
    }

    for q in &mut quiz.questions {
        if q.question.trim().is_empty() {
            return Err(format!("question {} has no text", q.id));
        }
        if q.kind == QuestionType::TrueFalse && q.options.is_empty() {
            q.options = vec!["True".to_string(), "False".to_string()];
        }
        match (q.kind, &q.correct) {
            (QuestionType::ShortAnswer, key) => {
                if key.as_text().trim().is_empty() {
                    return Err(format!("question {} has an empty answer key", q.id));
                }
            }
            (_, AnswerValue::Index(i)) if (0..q.options.len() as i64).contains(i) => {}
            _ => return Err(format!("question {} has no valid correct option", q.id)),
        }
    }
    Ok(quiz)
}

/// Short answers match case-insensitively, also when one contains the
/// other. Choice answers must equal the key exactly.
fn is_correct(question: &QuizQuestion, answer: &AnswerValue) -> bool {
    match question.kind {
        QuestionType::ShortAnswer => {
            let given = answer.as_text().trim().to_lowercase();
            let key = question.correct.as_text().trim().to_lowercase();
            !given.is_empty() && (given == key || key.contains(&given) || given.contains(&key))
        }
        QuestionType::MultipleChoice | QuestionType::TrueFalse => *answer == question.correct,
    }
}

pub fn feedback_for(percentage: u32) -> &'static str {
    match percentage {
        100.. => "🎉 Perfect score! You really know this topic!",
        80.. => "🌟 Great job! You have a solid understanding.",
        60.. => "👍 Good effort! Review the explanations to strengthen your knowledge.",
        40.. => "📚 Keep studying! Focus on the areas you missed.",
        _ => "💪 Don't give up! This topic needs more practice. Want me to explain the concepts?",
    }
}

fn percent(score: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        f64::from(score) / f64::from(total) * 100.0
    }
}

pub fn grade_quiz(quiz: &Quiz, answers: &[QuizAnswer]) -> QuizGrading {
    let results: Vec<QuestionResult> = quiz
        .questions
        .iter()
        .map(|q| {
            let given = answers.iter().find(|a| a.question_id == q.id);
            QuestionResult {
                question_id: q.id,
                correct: given.is_some_and(|a| is_correct(q, &a.answer)),
                user_answer: given
                    .map(|a| a.answer.clone())
                    .unwrap_or_else(|| AnswerValue::Text(NO_ANSWER.to_string())),
                correct_answer: q.correct.clone(),
                explanation: q.explanation.clone(),
            }
        })
        .collect();

    let score = results.iter().filter(|r| r.correct).count() as u32;
    let total = quiz.questions.len() as u32;
    let percentage = percent(score, total).round() as u32;

    QuizGrading {
        score,
        total,
        percentage,
        results,
        feedback: feedback_for(percentage),
    }
}

/// Summary over results in the order they were taken.
pub fn quiz_stats(results: &[QuizResultRow]) -> QuizStats {
    if results.is_empty() {
        return QuizStats {
            total_quizzes: 0,
            average_score: 0,
            top_topics: Vec::new(),
        };
    }

    let sum: f64 = results
        .iter()
        .map(|r| percent(r.score.max(0) as u32, r.total.max(0) as u32))
        .sum();
    let average = sum / results.len() as f64;

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for r in results {
        match counts.iter_mut().find(|(topic, _)| *topic == r.topic) {
            Some((_, n)) => *n += 1,
            None => counts.push((r.topic.as_str(), 1)),
        }
    }
    // Stable sort keeps first-seen order among equal counts.
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    QuizStats {
        total_quizzes: results.len(),
        average_score: average.round() as u32,
        top_topics: counts
            .into_iter()
            .take(TOP_TOPICS)
            .map(|(topic, _)| topic.to_string())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn quiz() -> Quiz {
        serde_json::from_value(json!({
            "action": "quiz",
            "topic": "Cells",
            "questions": [
                { "id": 1, "type": "multiple_choice", "question": "Powerhouse?",
                  "options": ["Nucleus", "Mitochondria", "Ribosome", "Wall"], "correct": 1,
                  "explanation": "ATP" },
                { "id": 2, "type": "true_false", "question": "Plants have walls.",
                  "options": ["True", "False"], "correct": 0 },
                { "id": 3, "type": "short_answer", "question": "Green pigment?",
                  "correct": "chlorophyll" },
                { "id": 4, "type": "short_answer", "question": "Cell division?",
                  "correct": "Mitosis" }
            ]
        }))
        .unwrap()
    }

    fn answers(value: serde_json::Value) -> Vec<QuizAnswer> {
        serde_json::from_value(value).unwrap()
    }

    fn row(topic: &str, score: i32, total: i32) -> QuizResultRow {
        QuizResultRow {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            topic: topic.to_string(),
            score,
            total,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_grade_all_correct() {
        let graded = grade_quiz(
            &quiz(),
            &answers(json!([
                { "questionId": 1, "answer": 1 },
                { "questionId": 2, "answer": 0 },
                { "questionId": 3, "answer": "  Chlorophyll " },
                { "questionId": 4, "answer": "mitosis" }
            ])),
        );
        assert_eq!((graded.score, graded.total, graded.percentage), (4, 4, 100));
        assert_eq!(graded.feedback, "🎉 Perfect score! You really know this topic!");
        assert_eq!(graded.results[0].explanation.as_deref(), Some("ATP"));
    }

    #[test]
    fn test_short_answer_matching_cases() {
        let q = &quiz().questions[2];
        let cases = [
            (json!("chlorophyll"), true),
            (json!("CHLOROPHYLL"), true),
            (json!("chloro"), true),
            (json!("chlorophyll a"), true),
            (json!("carotene"), false),
            (json!("   "), false),
            (json!(7), false),
        ];
        for (given, expected) in cases {
            let answer: AnswerValue = serde_json::from_value(given.clone()).unwrap();
            assert_eq!(is_correct(q, &answer), expected, "answer {given}");
        }
    }

    #[test]
    fn test_choice_answers_are_strict() {
        let q = &quiz().questions[0];
        assert!(is_correct(q, &AnswerValue::Index(1)));
        assert!(!is_correct(q, &AnswerValue::Text("1".to_string())));
        assert!(!is_correct(q, &AnswerValue::Text("Mitochondria".to_string())));
        assert!(!is_correct(q, &AnswerValue::Index(0)));
    }

    #[test]
    fn test_missing_answers_are_marked() {
        let graded = grade_quiz(&quiz(), &answers(json!([{ "questionId": 1, "answer": 1 }])));
        assert_eq!((graded.score, graded.percentage), (1, 25));
        assert_eq!(graded.feedback, feedback_for(25));
        assert!(!graded.results[1].correct);
        assert_eq!(graded.results[1].user_answer, AnswerValue::Text(NO_ANSWER.to_string()));
        assert_eq!(graded.results[1].correct_answer, AnswerValue::Index(0));
    }

    #[test]
    fn test_percentage_rounds() {
        let mut q = quiz();
        q.questions.truncate(3);
        let graded = grade_quiz(
            &q,
            &answers(json!([
                { "questionId": 1, "answer": 1 },
                { "questionId": 2, "answer": 0 }
            ])),
        );
        assert_eq!(graded.percentage, 67);
        assert_eq!(graded.feedback, "👍 Good effort! Review the explanations to strengthen your knowledge.");
    }

    #[test]
    fn test_empty_quiz_scores_zero() {
        let empty = Quiz {
            topic: "x".to_string(),
            questions: Vec::new(),
        };
        let graded = grade_quiz(&empty, &[]);
        assert_eq!((graded.score, graded.total, graded.percentage), (0, 0, 0));
    }

    #[test]
    fn test_feedback_bands() {
        let table = [
            (100, "🎉"),
            (99, "🌟"),
            (80, "🌟"),
            (79, "👍"),
            (60, "👍"),
            (59, "📚"),
            (40, "📚"),
            (39, "💪"),
            (0, "💪"),
        ];
        for (pct, prefix) in table {
            assert!(feedback_for(pct).starts_with(prefix), "{pct}%");
        }
    }

    #[test]
    fn test_normalize_fills_defaults() {
        let raw: Quiz = serde_json::from_value(json!({
            "questions": [
                { "id": 1, "type": "true_false", "question": "Water boils at 100C.", "correct": 0 }
            ]
        }))
        .unwrap();
        let quiz = normalize_quiz(raw, "Physics").unwrap();
        assert_eq!(quiz.topic, "Physics");
        assert_eq!(quiz.questions[0].options, vec!["True", "False"]);
    }

    #[test]
    fn test_normalize_rejects_bad_keys() {
        let mut q = quiz();
        q.questions[0].correct = AnswerValue::Index(4);
        assert!(normalize_quiz(q, "Cells").is_err());

        let mut q = quiz();
        q.questions[2].correct = AnswerValue::Text(" ".to_string());
        assert!(normalize_quiz(q, "Cells").is_err());

        let empty = Quiz {
            topic: String::new(),
            questions: Vec::new(),
        };
        assert!(normalize_quiz(empty, "Cells").is_err());
    }

    #[test]
    fn test_quiz_prompt_mentions_difficulty() {
        let p = build_quiz_prompt("Fractions", 3, Difficulty::Hard);
        assert!(p.starts_with("Generate a quiz on the topic: \"Fractions\""));
        assert!(p.contains("Create exactly 3 questions with analysis, synthesis, and complex problem-solving."));
        assert!(p.contains("\"topic\": \"Fractions\""));
    }

    #[test]
    fn test_question_count_clamped() {
        assert_eq!(clamp_question_count(None), 5);
        assert_eq!(clamp_question_count(Some(0)), 1);
        assert_eq!(clamp_question_count(Some(50)), 20);
    }

    #[test]
    fn test_stats() {
        let rows = vec![
            row("Algebra", 3, 4),
            row("Cells", 5, 5),
            row("Algebra", 1, 2),
            row("History", 0, 3),
            row("Cells", 2, 4),
        ];
        let stats = quiz_stats(&rows);
        assert_eq!(stats.total_quizzes, 5);
        // (75 + 100 + 50 + 0 + 50) / 5
        assert_eq!(stats.average_score, 55);
        assert_eq!(stats.top_topics, vec!["Algebra", "Cells", "History"]);
    }

    #[test]
    fn test_stats_top_five_in_first_seen_order() {
        let rows: Vec<QuizResultRow> = ["f", "e", "d", "c", "b", "a", "a"]
            .iter()
            .map(|t| row(t, 1, 1))
            .collect();
        assert_eq!(quiz_stats(&rows).top_topics, vec!["a", "f", "e", "d", "c"]);
        assert_eq!(quiz_stats(&[]), QuizStats {
            total_quizzes: 0,
            average_score: 0,
            top_topics: Vec::new(),
        });
    }
}
