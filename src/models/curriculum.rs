// src/models/curriculum.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'subjects' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subject {
    pub id: i64,
    pub subject_id: String,
    pub name: String,
    pub slug: String,
    pub department: String,
    pub description: String,
    pub display_on_frontend: bool,
    pub is_new: bool,
}

/// Represents the 'lessons' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Lesson {
    pub id: i64,
    pub lesson_id: String,
    pub subject_id: i64,
    pub department: String,
    pub name: String,
    /// Chapter number; lessons are listed in this order.
    pub position: i16,
    pub slug: String,
    pub tutorial_video: Option<String>,
    pub quiz_link: Option<String>,
    pub content: Option<String>,
    pub editor: Option<String>,
    pub display_on_frontend: bool,
    pub is_new: bool,
}

/// Lesson with the learner's completion flag.
#[derive(Debug, Serialize, FromRow)]
pub struct LessonWithProgress {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub lesson: Lesson,
    pub subject_name: String,
    pub completed: bool,
}

/// Completed lesson count per subject.
#[derive(Debug, Serialize, FromRow)]
pub struct SubjectProgress {
    pub subject_name: String,
    pub completed_count: i64,
}

/// DTO for creating a subject.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateSubjectRequest {
    #[validate(length(min = 1, max = 100))]
    pub subject_id: String,
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1, max = 50))]
    pub department: String,
    #[validate(length(max = 500))]
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub display_on_frontend: bool,
    #[serde(default)]
    pub is_new: bool,
}

/// DTO for creating a lesson under a subject.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateLessonRequest {
    #[validate(length(min = 1, max = 100))]
    pub lesson_id: String,
    pub subject_id: i64,
    #[validate(length(min = 1, max = 250))]
    pub name: String,
    #[validate(range(min = 0))]
    pub position: i16,
    #[validate(url)]
    pub tutorial_video: Option<String>,
    #[validate(url)]
    pub quiz_link: Option<String>,
    #[validate(url)]
    pub content: Option<String>,
    #[validate(url)]
    pub editor: Option<String>,
    #[serde(default = "default_true")]
    pub display_on_frontend: bool,
    #[serde(default)]
    pub is_new: bool,
}

fn default_true() -> bool {
    true
}
