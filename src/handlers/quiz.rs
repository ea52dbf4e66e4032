// src/handlers/quiz.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        quiz::{ActiveQuiz, CreateQuizRequest, PublicQuestion, Quiz, QuizDetail, QuizListParams},
        report::Audience,
        result::{ResultSummary, SubmitAttemptRequest},
        user::Role,
    },
    services::{
        accounts,
        attempts::{self, Learner},
        certificate::CertificateRenderer,
        reports, scoring,
    },
    utils::jwt::Claims,
};

const QUIZ_COLUMNS: &str = "id, quiz_name, topic, department, no_of_questions, time_minutes, \
     passing_score_percentage, start_date, end_date, created_by, quiz_type, created_at";

const RESULT_SUMMARY_SELECT: &str = r#"
    SELECT r.id AS result_id, q.id AS quiz_id, q.quiz_name, q.topic, q.quiz_type,
           q.no_of_questions, q.passing_score_percentage, r.score,
           r.correct_questions, r.wrong_questions, r.unattempted_questions,
           r.certificate, r.date_attempted
    FROM results r
    JOIN quizzes q ON q.id = r.quiz_id
"#;

/// Lists quizzes with optional filters.
///
/// * `department`, `quiz_type`: exact match.
/// * `search`: case-insensitive match on name or topic.
/// * `ordering`: see `QuizListParams::order_clause`.
pub async fn list_quizzes(
    State(pool): State<PgPool>,
    Query(params): Query<QuizListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {QUIZ_COLUMNS} FROM quizzes WHERE TRUE"));

    if let Some(department) = params.department.as_deref().filter(|d| !d.is_empty()) {
        builder.push(" AND department = ");
        builder.push_bind(department.to_string());
    }
    if let Some(quiz_type) = params.quiz_type.as_deref().filter(|t| !t.is_empty()) {
        builder.push(" AND quiz_type = ");
        builder.push_bind(quiz_type.to_string());
    }
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder.push(" AND (quiz_name ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR topic ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    builder.push(" ORDER BY ");
    builder.push(params.order_clause());

    let quizzes: Vec<Quiz> = builder
        .build_query_as()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list quizzes: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(quizzes))
}

/// Quiz with its questions and answer texts. Correctness flags are never exposed.
pub async fn get_quiz(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = attempts::find_quiz(&pool, id).await?;
    let bank = attempts::load_question_bank(&pool, id).await?;

    let questions = bank
        .into_iter()
        .map(|q| PublicQuestion {
            id: q.id,
            question_number: q.question_number,
            question: q.text,
            answers: q.answers.into_iter().map(|a| a.answer).collect(),
        })
        .collect();

    Ok(Json(QuizDetail { quiz, questions }))
}

/// Quiz content in the shape the attempt form uses: one `{question: [answers]}`
/// object per question, plus the duration in minutes.
pub async fn quiz_data(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = attempts::find_quiz(&pool, id).await?;
    let bank = attempts::load_question_bank(&pool, id).await?;

    let data: Vec<serde_json::Value> = bank
        .into_iter()
        .map(|q| {
            let answers: Vec<String> = q.answers.into_iter().map(|a| a.answer).collect();
            let mut pair = serde_json::Map::new();
            pair.insert(q.text, json!(answers));
            serde_json::Value::Object(pair)
        })
        .collect();

    Ok(Json(json!({
        "data": data,
        "time": quiz.time_minutes,
    })))
}

/// Quizzes open now in the learner's department that they have not attempted.
pub async fn available_quizzes(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let profile = accounts::require_profile(&pool, user_id).await?;

    let quizzes = sqlx::query_as::<_, ActiveQuiz>(
        r#"
        SELECT q.id, q.quiz_name, q.topic, q.quiz_type, q.time_minutes, q.start_date, q.end_date,
               FALSE AS has_attempted
        FROM quizzes q
        WHERE q.department = $1
          AND q.start_date <= NOW() AND q.end_date >= NOW()
          AND NOT EXISTS (SELECT 1 FROM results r WHERE r.quiz_id = q.id AND r.user_id = $2)
        ORDER BY q.end_date, q.id
        "#,
    )
    .bind(&profile.department)
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list available quizzes: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(quizzes))
}

/// Creates a quiz with its questions and answers in one transaction.
/// Trainer or admin. Empty report rows are created for both audiences.
pub async fn create_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQuizRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    payload.check_consistency().map_err(AppError::BadRequest)?;

    let no_of_questions = payload
        .no_of_questions
        .unwrap_or(payload.questions.len() as i32);

    let mut tx = pool.begin().await?;

    let quiz = sqlx::query_as::<_, Quiz>(&format!(
        r#"
        INSERT INTO quizzes
            (quiz_name, topic, department, no_of_questions, time_minutes,
             passing_score_percentage, start_date, end_date, created_by, quiz_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING {QUIZ_COLUMNS}
        "#
    ))
    .bind(payload.quiz_name.trim())
    .bind(payload.topic.trim())
    .bind(payload.department.trim())
    .bind(no_of_questions)
    .bind(payload.time_minutes)
    .bind(payload.passing_score_percentage)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(claims.user_id()?)
    .bind(payload.quiz_type.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create quiz: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    for (index, question) in payload.questions.iter().enumerate() {
        let number = question.question_number.unwrap_or(index as i32 + 1);
        let (question_id,): (i64,) = sqlx::query_as(
            "INSERT INTO questions (quiz_id, question_number, question) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(quiz.id)
        .bind(number)
        .bind(question.question.trim())
        .fetch_one(&mut *tx)
        .await?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO answers (question_id, answer, correct) ");
        builder.push_values(&question.answers, |mut row, answer| {
            row.push_bind(question_id)
                .push_bind(answer.answer.trim())
                .push_bind(answer.correct);
        });
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    for audience in Audience::ALL {
        if let Err(e) = reports::ensure_report(&pool, &quiz, audience).await {
            tracing::warn!("Failed to create {} report for quiz {}: {:?}", audience, quiz.id, e);
        }
    }

    tracing::info!(
        "{} created quiz {} with {} questions",
        claims.username,
        quiz.id,
        no_of_questions
    );

    Ok((StatusCode::CREATED, Json(json!({ "id": quiz.id }))))
}

/// Deletes a quiz. Trainers may delete only their own; admins any.
pub async fn delete_quiz(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = attempts::find_quiz(&pool, id).await?;

    if claims.role()? != Role::Admin && quiz.created_by != Some(claims.user_id()?) {
        return Err(AppError::Forbidden(
            "You can only delete quizzes you created".to_string(),
        ));
    }

    sqlx::query("DELETE FROM quizzes WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete quiz {}: {:?}", id, e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(StatusCode::NO_CONTENT)
}

/// Grades and stores the learner's attempt.
///
/// * 404 for an unknown quiz.
/// * 409 when the learner already attempted it.
pub async fn submit_attempt(
    State(pool): State<PgPool>,
    State(certificates): State<Arc<dyn CertificateRenderer>>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<SubmitAttemptRequest>,
) -> Result<impl IntoResponse, AppError> {
    let learner = Learner {
        user_id: claims.user_id()?,
        username: claims.username.clone(),
        role: claims.role()?,
    };

    let response =
        attempts::submit_attempt(&pool, certificates.as_ref(), id, &learner, req.answers()).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

/// The learner's own results, newest first.
pub async fn my_results(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let results = sqlx::query_as::<_, ResultSummary>(&format!(
        "{RESULT_SUMMARY_SELECT} WHERE r.user_id = $1 ORDER BY r.date_attempted DESC"
    ))
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list results: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(results))
}

/// One of the learner's results with per-question feedback.
pub async fn my_result_detail(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(result_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let summary = sqlx::query_as::<_, ResultSummary>(&format!(
        "{RESULT_SUMMARY_SELECT} WHERE r.id = $1 AND r.user_id = $2"
    ))
    .bind(result_id)
    .bind(claims.user_id()?)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Result not found".to_string()))?;

    let feedback = attempts::feedback_for(&pool, result_id).await?;
    let passed = scoring::is_pass(summary.score, summary.passing_score_percentage);

    Ok(Json(json!({
        "result": summary,
        "passed": passed,
        "questions_feedback": feedback,
    })))
}
