// src/models/quiz.rs

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Quiz category. Also used as the report type of an assessment report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuizType {
    Homework,
    PreAssessment,
    PostAssessment,
    DailyQuiz,
    WeeklyQuiz,
    MonthlyQuiz,
    FinalExam,
}

impl QuizType {
    pub const ALL: [QuizType; 7] = [
        QuizType::Homework,
        QuizType::PreAssessment,
        QuizType::PostAssessment,
        QuizType::DailyQuiz,
        QuizType::WeeklyQuiz,
        QuizType::MonthlyQuiz,
        QuizType::FinalExam,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuizType::Homework => "homework",
            QuizType::PreAssessment => "pre-assessment",
            QuizType::PostAssessment => "post-assessment",
            QuizType::DailyQuiz => "daily-quiz",
            QuizType::WeeklyQuiz => "weekly-quiz",
            QuizType::MonthlyQuiz => "monthly-quiz",
            QuizType::FinalExam => "final-exam",
        }
    }

    /// Lenient mapping from a stored quiz type to a report type.
    /// Accepts underscores and spaces; unknown values fall back to daily-quiz.
    pub fn report_type_for(raw: &str) -> QuizType {
        let norm = raw.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        norm.parse().unwrap_or(QuizType::DailyQuiz)
    }
}

impl FromStr for QuizType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuizType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Invalid quiz type: {}", s))
    }
}

/// Represents the 'quizzes' table.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,
    pub quiz_name: String,
    pub topic: String,
    pub department: String,
    /// Configured question count. Used as the scoring denominator.
    pub no_of_questions: i32,
    /// Duration in minutes.
    pub time_minutes: i32,
    pub passing_score_percentage: i32,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub created_by: Option<i64>,
    pub quiz_type: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Quiz {
    /// A quiz is open when both window bounds are set and `now` falls inside them.
    pub fn is_open_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => start <= now && now <= end,
            _ => false,
        }
    }
}

/// Represents the 'questions' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Question {
    pub id: i64,
    pub quiz_id: i64,
    pub question_number: i32,
    pub question: String,
}

/// Represents the 'answers' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    pub answer: String,
    pub correct: bool,
}

/// Question sent to learners: answer texts only, correctness hidden.
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_number: i32,
    pub question: String,
    pub answers: Vec<String>,
}

/// Quiz with its public question bank.
#[derive(Debug, Serialize)]
pub struct QuizDetail {
    #[serde(flatten)]
    pub quiz: Quiz,
    pub questions: Vec<PublicQuestion>,
}

/// Quiz list row for learners, flagged with their attempt status.
#[derive(Debug, Serialize, FromRow)]
pub struct ActiveQuiz {
    pub id: i64,
    pub quiz_name: String,
    pub topic: String,
    pub quiz_type: String,
    pub time_minutes: i32,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub has_attempted: bool,
}

/// Query parameters for listing quizzes.
#[derive(Debug, Default, Deserialize)]
pub struct QuizListParams {
    pub department: Option<String>,
    pub quiz_type: Option<String>,
    /// Case-insensitive match on name or topic.
    pub search: Option<String>,
    /// One of 'id', '-id', 'quiz_name', '-quiz_name'. Defaults to '-id'.
    pub ordering: Option<String>,
}

impl QuizListParams {
    /// Whitelisted ORDER BY clause.
    pub fn order_clause(&self) -> &'static str {
        match self.ordering.as_deref().map(str::trim) {
            Some("id") => "id ASC",
            Some("quiz_name") => "quiz_name ASC, id DESC",
            Some("-quiz_name") => "quiz_name DESC, id DESC",
            _ => "id DESC",
        }
    }
}

/// DTO for an answer option when authoring a quiz.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateAnswerRequest {
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
    #[serde(default)]
    pub correct: bool,
}

/// DTO for a question when authoring a quiz.
#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    /// Defaults to the position in the submitted list (1-based).
    pub question_number: Option<i32>,
    #[validate(length(min = 1, max = 500))]
    pub question: String,
    #[validate(nested, custom(function = validate_answers))]
    pub answers: Vec<CreateAnswerRequest>,
}

/// DTO for creating a quiz with its question bank.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 150))]
    pub quiz_name: String,
    #[validate(length(min = 1, max = 150))]
    pub topic: String,
    #[validate(length(min = 1, max = 50))]
    pub department: String,
    /// Defaults to the number of questions supplied.
    #[validate(range(min = 1))]
    pub no_of_questions: Option<i32>,
    #[validate(range(min = 1, max = 600))]
    pub time_minutes: i32,
    #[validate(range(min = 0, max = 100))]
    pub passing_score_percentage: i32,
    pub start_date: Option<chrono::DateTime<chrono::Utc>>,
    pub end_date: Option<chrono::DateTime<chrono::Utc>>,
    pub quiz_type: QuizType,
    #[validate(length(min = 1, message = "A quiz needs at least one question."), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

impl CreateQuizRequest {
    /// Checks that cannot be expressed as field validators.
    pub fn check_consistency(&self) -> Result<(), String> {
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err("end_date must not be before start_date".to_string());
            }
        }
        if let Some(n) = self.no_of_questions {
            if n as usize != self.questions.len() {
                return Err(format!(
                    "no_of_questions is {} but {} questions were supplied",
                    n,
                    self.questions.len()
                ));
            }
        }
        Ok(())
    }
}

/// Every question must have exactly one correct answer.
fn validate_answers(answers: &[CreateAnswerRequest]) -> Result<(), validator::ValidationError> {
    if answers.is_empty() {
        return Err(validator::ValidationError::new("answers_cannot_be_empty"));
    }
    let correct = answers.iter().filter(|a| a.correct).count();
    if correct != 1 {
        return Err(validator::ValidationError::new("exactly_one_correct_answer"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(text: &str, correct: &[bool]) -> CreateQuestionRequest {
        CreateQuestionRequest {
            question_number: None,
            question: text.to_string(),
            answers: correct
                .iter()
                .enumerate()
                .map(|(i, c)| CreateAnswerRequest {
                    answer: format!("option {}", i),
                    correct: *c,
                })
                .collect(),
        }
    }

    fn quiz(questions: Vec<CreateQuestionRequest>) -> CreateQuizRequest {
        CreateQuizRequest {
            quiz_name: "Rust basics".into(),
            topic: "Ownership".into(),
            department: "IT".into(),
            no_of_questions: None,
            time_minutes: 15,
            passing_score_percentage: 60,
            start_date: None,
            end_date: None,
            quiz_type: QuizType::Homework,
            questions,
        }
    }

    #[test]
    fn quiz_type_round_trips_through_text() {
        for t in QuizType::ALL {
            assert_eq!(t.as_str().parse::<QuizType>().unwrap(), t);
        }
        let parsed: QuizType = serde_json::from_str("\"pre-assessment\"").unwrap();
        assert_eq!(parsed, QuizType::PreAssessment);
    }

    #[test]
    fn report_type_normalizes_and_falls_back() {
        assert_eq!(QuizType::report_type_for("final_exam"), QuizType::FinalExam);
        assert_eq!(QuizType::report_type_for("Weekly Quiz"), QuizType::WeeklyQuiz);
        assert_eq!(QuizType::report_type_for("pop-quiz"), QuizType::DailyQuiz);
    }

    #[test]
    fn ordering_is_whitelisted() {
        let mut params = QuizListParams::default();
        assert_eq!(params.order_clause(), "id DESC");
        params.ordering = Some("quiz_name".into());
        assert_eq!(params.order_clause(), "quiz_name ASC, id DESC");
        params.ordering = Some("id; DROP TABLE quizzes".into());
        assert_eq!(params.order_clause(), "id DESC");
    }

    #[test]
    fn question_needs_exactly_one_correct_answer() {
        assert!(quiz(vec![question("q1", &[true, false])]).validate().is_ok());
        assert!(quiz(vec![question("q1", &[false, false])]).validate().is_err());
        assert!(quiz(vec![question("q1", &[true, true])]).validate().is_err());
    }

    #[test]
    fn quiz_needs_questions() {
        assert!(quiz(vec![]).validate().is_err());
    }

    #[test]
    fn authoring_errors_are_keyed_by_field() {
        let err = quiz(vec![]).validate().unwrap_err();
        assert!(err.errors().contains_key("questions"));

        let err = quiz(vec![question("q1", &[true]), question("q2", &[false, false])])
            .validate()
            .unwrap_err();
        assert!(err.errors().contains_key("questions"));
        assert!(!err.errors().contains_key("quiz_name"));
    }

    #[test]
    fn configured_count_must_match_questions() {
        let mut req = quiz(vec![question("q1", &[true]), question("q2", &[true])]);
        req.no_of_questions = Some(3);
        assert!(req.check_consistency().is_err());
        req.no_of_questions = Some(2);
        assert!(req.check_consistency().is_ok());
    }

    #[test]
    fn open_window_requires_both_bounds() {
        let now = chrono::Utc::now();
        let mut q = Quiz {
            id: 1,
            quiz_name: "n".into(),
            topic: "t".into(),
            department: "IT".into(),
            no_of_questions: 1,
            time_minutes: 5,
            passing_score_percentage: 50,
            start_date: Some(now - chrono::Duration::hours(1)),
            end_date: None,
            created_by: None,
            quiz_type: "homework".into(),
            created_at: now,
        };
        assert!(!q.is_open_at(now));
        q.end_date = Some(now + chrono::Duration::hours(1));
        assert!(q.is_open_at(now));
    }
}
