// src/models/result.rs

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Represents the 'results' table. One row per (user, quiz).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct QuizResult {
    pub id: i64,
    pub quiz_id: i64,
    pub user_id: i64,
    pub score: f64,
    pub correct_questions: i32,
    pub wrong_questions: i32,
    pub unattempted_questions: i32,
    /// Path of the generated certificate, relative to the media root.
    pub certificate: Option<String>,
    pub date_attempted: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'result_answers' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ResultAnswer {
    pub id: i64,
    pub result_id: i64,
    pub question_id: i64,
    pub selected_answer_id: Option<i64>,
    pub is_correct: bool,
}

/// Key: question text. Value: selected answer text, null or empty when skipped.
pub type Selections = HashMap<String, Option<String>>;

/// DTO for submitting a quiz attempt: either `{"answers": {...}}` or the
/// question-to-answer map as the whole body.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum SubmitAttemptRequest {
    Wrapped { answers: Selections },
    Bare(Selections),
}

impl SubmitAttemptRequest {
    pub fn answers(&self) -> &Selections {
        match self {
            SubmitAttemptRequest::Wrapped { answers } => answers,
            SubmitAttemptRequest::Bare(answers) => answers,
        }
    }
}

/// Per-question outcome returned to the learner.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct QuestionFeedback {
    pub question: String,
    pub correct_answer: String,
    pub student_answer: Option<String>,
    pub is_correct: bool,
}

/// Response of a graded attempt.
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub result_id: i64,
    pub passed: bool,
    /// Score formatted with two decimals, e.g. "50.00".
    pub score: String,
    pub correct_questions: i32,
    pub wrong_questions: i32,
    pub unattempted_questions: i32,
    pub certificate_url: Option<String>,
    pub questions_feedback: Vec<QuestionFeedback>,
}

/// A learner's past attempt with quiz context, used by "my results" and dashboards.
#[derive(Debug, Serialize, FromRow)]
pub struct ResultSummary {
    pub result_id: i64,
    pub quiz_id: i64,
    pub quiz_name: String,
    pub topic: String,
    pub quiz_type: String,
    pub no_of_questions: i32,
    pub passing_score_percentage: i32,
    pub score: f64,
    pub correct_questions: i32,
    pub wrong_questions: i32,
    pub unattempted_questions: i32,
    pub certificate: Option<String>,
    pub date_attempted: chrono::DateTime<chrono::Utc>,
}
