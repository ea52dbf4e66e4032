// src/handlers/dashboard.rs

use std::collections::BTreeMap;

use axum::{Extension, Json, extract::State, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use sqlx::{FromRow, PgPool};

use crate::{
    error::AppError,
    models::{
        activity::{LoginSummary, RecentLogin},
        curriculum::{Subject, SubjectProgress},
        quiz::ActiveQuiz,
        result::QuestionFeedback,
    },
    services::{
        accounts, activity, attempts,
        certificate::certificate_url,
        scoring::{self, round2},
    },
    utils::jwt::Claims,
};

/// One attempt on the learner dashboard, with quiz-wide context.
#[derive(Debug, FromRow)]
struct AttemptRow {
    result_id: i64,
    quiz_name: String,
    topic: String,
    quiz_type: String,
    passing_score_percentage: i32,
    score: f64,
    correct_questions: i32,
    wrong_questions: i32,
    unattempted_questions: i32,
    certificate: Option<String>,
    date_attempted: chrono::DateTime<chrono::Utc>,
    quiz_average: f64,
    quiz_highest: f64,
}

#[derive(Debug, Serialize)]
struct DashboardReport {
    result_id: i64,
    quiz_name: String,
    topic: String,
    score: f64,
    passed: bool,
    average_score: f64,
    highest_score: f64,
    correct_questions: i32,
    wrong_questions: i32,
    unattempted_questions: i32,
    certificate_url: Option<String>,
    date_attempted: chrono::DateTime<chrono::Utc>,
    questions_feedback: Vec<QuestionFeedback>,
}

/// Everything the learner landing page shows.
///
/// * Profile, department subjects and lesson progress.
/// * Quizzes open now, flagged with `has_attempted`.
/// * Past attempts grouped by quiz type, with quiz average and top score.
pub async fn learner_dashboard(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let profile = accounts::require_profile(&pool, user_id).await?;

    let subjects = sqlx::query_as::<_, Subject>(
        r#"
        SELECT id, subject_id, name, slug, department, description, display_on_frontend, is_new
        FROM subjects
        WHERE department = $1 AND display_on_frontend
        ORDER BY name
        "#,
    )
    .bind(&profile.department)
    .fetch_all(&pool)
    .await?;

    let active_quizzes = sqlx::query_as::<_, ActiveQuiz>(
        r#"
        SELECT q.id, q.quiz_name, q.topic, q.quiz_type, q.time_minutes, q.start_date, q.end_date,
               EXISTS (SELECT 1 FROM results r WHERE r.quiz_id = q.id AND r.user_id = $2) AS has_attempted
        FROM quizzes q
        WHERE q.department = $1 AND q.start_date <= NOW() AND q.end_date >= NOW()
        ORDER BY q.end_date, q.id
        "#,
    )
    .bind(&profile.department)
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    let (login_count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM login_activities WHERE user_id = $1 AND status = 'S'")
            .bind(user_id)
            .fetch_one(&pool)
            .await?;

    let attempts_rows = sqlx::query_as::<_, AttemptRow>(
        r#"
        SELECT r.id AS result_id, q.quiz_name, q.topic, q.quiz_type, q.passing_score_percentage,
               r.score, r.correct_questions, r.wrong_questions, r.unattempted_questions,
               r.certificate, r.date_attempted,
               (SELECT AVG(x.score) FROM results x WHERE x.quiz_id = q.id)::FLOAT8 AS quiz_average,
               (SELECT MAX(x.score) FROM results x WHERE x.quiz_id = q.id) AS quiz_highest
        FROM results r
        JOIN quizzes q ON q.id = r.quiz_id
        WHERE r.user_id = $1
        ORDER BY r.date_attempted DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load dashboard results: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let mut reports: BTreeMap<String, Vec<DashboardReport>> = BTreeMap::new();
    for row in attempts_rows {
        let questions_feedback = attempts::feedback_for(&pool, row.result_id).await?;
        reports.entry(row.quiz_type).or_default().push(DashboardReport {
            result_id: row.result_id,
            quiz_name: row.quiz_name,
            topic: row.topic,
            score: row.score,
            passed: scoring::is_pass(row.score, row.passing_score_percentage),
            average_score: round2(row.quiz_average),
            highest_score: row.quiz_highest,
            correct_questions: row.correct_questions,
            wrong_questions: row.wrong_questions,
            unattempted_questions: row.unattempted_questions,
            certificate_url: row.certificate.as_deref().map(certificate_url),
            date_attempted: row.date_attempted,
            questions_feedback,
        });
    }

    let lesson_progress = sqlx::query_as::<_, SubjectProgress>(
        r#"
        SELECT s.name AS subject_name, COUNT(*) AS completed_count
        FROM lesson_completions lc
        JOIN lessons l ON l.id = lc.lesson_id
        JOIN subjects s ON s.id = l.subject_id
        WHERE lc.user_id = $1 AND lc.completed
        GROUP BY s.name
        ORDER BY s.name
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(json!({
        "username": claims.username,
        "profile": profile,
        "subjects": subjects,
        "active_quizzes": active_quizzes,
        "login_count": login_count,
        "reports": reports,
        "lesson_progress": lesson_progress,
    })))
}

/// Trainer landing page: own profile, trainee and quiz counts, recent learner logins.
pub async fn trainer_dashboard(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let profile = accounts::require_profile(&pool, user_id).await?;

    let (trainee_count, quiz_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM profiles WHERE trainer_id = $1),
            (SELECT COUNT(*) FROM quizzes WHERE created_by = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    let recent_logins = sqlx::query_as::<_, RecentLogin>(
        r#"
        SELECT u.username, (MAX(la.login_datetime) AT TIME ZONE 'UTC')::DATE AS login_date
        FROM login_activities la
        JOIN users u ON u.id = la.user_id
        JOIN profiles p ON p.user_id = u.id
        WHERE p.department = $1 AND u.role IN ('trainee', 'employee')
        GROUP BY u.username
        ORDER BY MAX(la.login_datetime) DESC
        LIMIT 5
        "#,
    )
    .bind(&profile.department)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load recent logins: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(json!({
        "username": claims.username,
        "profile": profile,
        "trainee_count": trainee_count,
        "quiz_count": quiz_count,
        "recent_logins": recent_logins,
    })))
}

/// Per-day login counts and estimated minutes spent for the learner.
pub async fn login_activity(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let profile = accounts::require_profile(&pool, user_id).await?;

    let logins = activity::login_times(&pool, user_id).await?;
    let summary = activity::summarize_logins(&logins);

    Ok(Json(LoginSummary {
        name: profile.name,
        department: profile.department,
        total_logins: logins.len() as i64,
        login_summary: summary,
    }))
}
