// src/handlers/report.rs

use std::collections::HashMap;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    models::{
        quiz::Quiz,
        report::{AssessmentReport, Audience, ReportParams, ReportWithResults},
        user::Role,
    },
    services::{attempts, reports},
    utils::jwt::Claims,
};

async fn with_results(
    pool: &PgPool,
    report: AssessmentReport,
    quiz: &Quiz,
) -> Result<ReportWithResults, AppError> {
    let audience: Audience = report
        .audience
        .parse()
        .map_err(AppError::InternalServerError)?;
    let results = reports::attempts_for(pool, report.quiz_id, audience).await?;
    Ok(ReportWithResults {
        report,
        quiz_name: quiz.quiz_name.clone(),
        department: quiz.department.clone(),
        results,
    })
}

/// Quizzes in scope: the requested one, else the caller's own (all for admins).
async fn quizzes_in_scope(
    pool: &PgPool,
    claims: &Claims,
    quiz_id: Option<i64>,
) -> Result<Vec<Quiz>, AppError> {
    if let Some(id) = quiz_id {
        return Ok(vec![attempts::find_quiz(pool, id).await?]);
    }

    let quizzes = sqlx::query_as::<_, Quiz>(
        r#"
        SELECT id, quiz_name, topic, department, no_of_questions, time_minutes,
               passing_score_percentage, start_date, end_date, created_by, quiz_type, created_at
        FROM quizzes
        WHERE $1 OR created_by = $2
        ORDER BY id DESC
        "#,
    )
    .bind(claims.role()? == Role::Admin)
    .bind(claims.user_id()?)
    .fetch_all(pool)
    .await?;

    Ok(quizzes)
}

/// Assessment reports with the attempts behind them.
///
/// * With `quiz_id`: that quiz only; missing reports are created and all are
///   recomputed unless `autocreate` / `refresh` are set false.
/// * Without: every quiz the caller created; `autocreate` and `refresh` default off.
/// * `audience` narrows to trainee or employee.
pub async fn assessment_reports(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, AppError> {
    let quizzes = quizzes_in_scope(&pool, &claims, params.quiz_id).await?;
    let audiences: Vec<Audience> = match params.audience() {
        Some(a) => vec![a],
        None => Audience::ALL.to_vec(),
    };

    if params.autocreate() {
        for quiz in &quizzes {
            for audience in &audiences {
                reports::ensure_report(&pool, quiz, *audience).await?;
            }
        }
    }

    let by_id: HashMap<i64, &Quiz> = quizzes.iter().map(|q| (q.id, q)).collect();
    let ids: Vec<i64> = quizzes.iter().map(|q| q.id).collect();
    let existing = reports::reports_for_quizzes(&pool, &ids, params.audience()).await?;

    let mut out = Vec::with_capacity(existing.len());
    for report in existing {
        let Some(quiz) = by_id.get(&report.quiz_id) else {
            continue;
        };
        let report = if params.refresh() {
            let audience: Audience = report
                .audience
                .parse()
                .map_err(AppError::InternalServerError)?;
            reports::refresh_report(&pool, quiz, audience)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to refresh report {}: {:?}", report.id, e);
                    AppError::from(e)
                })?
        } else {
            report
        };
        out.push(with_results(&pool, report, quiz).await?);
    }

    Ok(Json(out))
}

/// One report by id; `refresh=true` recomputes it first.
pub async fn get_report(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Query(params): Query<ReportParams>,
) -> Result<impl IntoResponse, AppError> {
    let report = reports::find_report(&pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Report not found".to_string()))?;
    let quiz = attempts::find_quiz(&pool, report.quiz_id).await?;

    let report = if params.refresh() {
        let audience: Audience = report
            .audience
            .parse()
            .map_err(AppError::InternalServerError)?;
        reports::refresh_report(&pool, &quiz, audience).await?
    } else {
        report
    };

    Ok(Json(with_results(&pool, report, &quiz).await?))
}
