// src/services/attempts.rs
//
// Persists a graded attempt. The result, its per-question answers and the
// certificate path are written in one transaction; the report refresh runs
// after commit.

use std::collections::HashMap;

use sqlx::PgPool;

use crate::{
    config::MISSING_CORRECT_ANSWER,
    error::{AppError, conflict_or_internal},
    models::{
        quiz::{Answer, Question, Quiz},
        report::Audience,
        result::{AttemptResponse, QuestionFeedback, QuizResult},
        user::Role,
    },
    services::{
        accounts,
        certificate::{CertificateInput, CertificateRenderer, certificate_url},
        reports,
        scoring::{self, GradingQuestion},
    },
};

const DUPLICATE_ATTEMPT: &str = "You have already attempted this quiz";

/// The learner submitting an attempt.
#[derive(Debug, Clone)]
pub struct Learner {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl Learner {
    fn audience(&self) -> Option<Audience> {
        match self.role {
            Role::Trainee => Some(Audience::Trainee),
            Role::Employee => Some(Audience::Employee),
            _ => None,
        }
    }
}

pub async fn find_quiz(pool: &PgPool, quiz_id: i64) -> Result<Quiz, AppError> {
    sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, quiz_name, topic, department, no_of_questions, time_minutes,
               passing_score_percentage, start_date, end_date, created_by, quiz_type, created_at
        FROM quizzes
        WHERE id = $1
        "#,
    )
    .bind(quiz_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Quiz not found".to_string()))
}

/// Questions of a quiz in question order, each with its answers in id order.
pub async fn load_question_bank(
    pool: &PgPool,
    quiz_id: i64,
) -> Result<Vec<GradingQuestion>, sqlx::Error> {
    let questions = sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, question_number, question FROM questions WHERE quiz_id = $1 ORDER BY question_number, id",
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let answers = sqlx::query_as::<_, Answer>(
        r#"
        SELECT a.id, a.question_id, a.answer, a.correct
        FROM answers a
        JOIN questions q ON q.id = a.question_id
        WHERE q.quiz_id = $1
        ORDER BY a.id
        "#,
    )
    .bind(quiz_id)
    .fetch_all(pool)
    .await?;

    let mut by_question: HashMap<i64, Vec<Answer>> = HashMap::new();
    for answer in answers {
        by_question.entry(answer.question_id).or_default().push(answer);
    }

    Ok(questions
        .into_iter()
        .map(|q| GradingQuestion {
            answers: by_question.remove(&q.id).unwrap_or_default(),
            id: q.id,
            question_number: q.question_number,
            text: q.question,
        })
        .collect())
}

/// Grades and stores a learner's single attempt at a quiz.
///
/// * `Conflict` when a result already exists for (learner, quiz); the unique
///   constraint closes the race between the check and the insert.
/// * A certificate rendering failure rolls the whole attempt back.
pub async fn submit_attempt(
    pool: &PgPool,
    certificates: &dyn CertificateRenderer,
    quiz_id: i64,
    learner: &Learner,
    submission: &HashMap<String, Option<String>>,
) -> Result<AttemptResponse, AppError> {
    let quiz = find_quiz(pool, quiz_id).await?;

    let already: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM results WHERE user_id = $1 AND quiz_id = $2")
            .bind(learner.user_id)
            .bind(quiz.id)
            .fetch_optional(pool)
            .await?;
    if already.is_some() {
        return Err(AppError::Conflict(DUPLICATE_ATTEMPT.to_string()));
    }

    let bank = load_question_bank(pool, quiz.id).await.map_err(|e| {
        tracing::error!("Failed to load questions of quiz {}: {:?}", quiz.id, e);
        AppError::from(e)
    })?;
    let grade = scoring::grade(&bank, submission, quiz.no_of_questions);
    let passed = grade.passed(quiz.passing_score_percentage);

    let profile = accounts::find_profile(pool, learner.user_id).await?;

    let mut tx = pool.begin().await?;

    let result = sqlx::query_as::<_, QuizResult>(
        r#"
        INSERT INTO results (quiz_id, user_id, score, correct_questions, wrong_questions, unattempted_questions)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, quiz_id, user_id, score, correct_questions, wrong_questions,
                  unattempted_questions, certificate, date_attempted
        "#,
    )
    .bind(quiz.id)
    .bind(learner.user_id)
    .bind(grade.score)
    .bind(grade.correct)
    .bind(grade.wrong)
    .bind(grade.unattempted)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict_or_internal(e, DUPLICATE_ATTEMPT))?;

    for graded in &grade.questions {
        sqlx::query(
            "INSERT INTO result_answers (result_id, question_id, selected_answer_id, is_correct) VALUES ($1, $2, $3, $4)",
        )
        .bind(result.id)
        .bind(graded.question_id)
        .bind(graded.selected_answer_id)
        .bind(graded.is_correct())
        .execute(&mut *tx)
        .await?;
    }

    let input = CertificateInput {
        user_id: learner.user_id,
        quiz_id: quiz.id,
        result_id: result.id,
        username: learner.username.clone(),
        learner_name: profile.as_ref().map(|p| p.name.clone()).unwrap_or_default(),
        department: profile
            .as_ref()
            .map(|p| p.department.clone())
            .unwrap_or_else(|| quiz.department.clone()),
        quiz_name: quiz.quiz_name.clone(),
        topic: quiz.topic.clone(),
        score: grade.score,
        passed,
        date_attempted: result.date_attempted,
    };
    let certificate = certificates.render(&input).await?;

    sqlx::query("UPDATE results SET certificate = $1 WHERE id = $2")
        .bind(&certificate)
        .bind(result.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(
        "User {} scored {:.2} on quiz {} ({}/{}/{})",
        learner.username,
        grade.score,
        quiz.id,
        grade.correct,
        grade.wrong,
        grade.unattempted
    );

    if let Some(audience) = learner.audience() {
        reports::refresh_after_attempt(pool, &quiz, audience).await;
    }

    Ok(AttemptResponse {
        result_id: result.id,
        passed,
        score: scoring::format_score(grade.score),
        correct_questions: grade.correct,
        wrong_questions: grade.wrong,
        unattempted_questions: grade.unattempted,
        certificate_url: Some(certificate_url(&certificate)),
        questions_feedback: grade.questions.into_iter().map(|q| q.feedback).collect(),
    })
}

/// Stored per-question feedback of a result, in question order.
pub async fn feedback_for(pool: &PgPool, result_id: i64) -> Result<Vec<QuestionFeedback>, sqlx::Error> {
    sqlx::query_as::<_, QuestionFeedback>(
        r#"
        SELECT
            q.question,
            COALESCE(
                (SELECT a.answer FROM answers a WHERE a.question_id = q.id AND a.correct ORDER BY a.id LIMIT 1),
                $2
            ) AS correct_answer,
            sel.answer AS student_answer,
            ra.is_correct
        FROM result_answers ra
        JOIN questions q ON q.id = ra.question_id
        LEFT JOIN answers sel ON sel.id = ra.selected_answer_id
        WHERE ra.result_id = $1
        ORDER BY q.question_number, q.id
        "#,
    )
    .bind(result_id)
    .bind(MISSING_CORRECT_ANSWER)
    .fetch_all(pool)
    .await
}
