// src/services/reports.rs
//
// Assessment report rollups. A report is a cached aggregate per (quiz, audience);
// recomputation is idempotent and unlocked, the last writer wins.

use sqlx::PgPool;

use crate::{
    models::{
        quiz::{Quiz, QuizType},
        report::{AssessmentReport, AttemptRecord, Audience},
    },
    services::scoring::round2,
};

const REPORT_COLUMNS: &str = "id, quiz_id, audience, report_type, total_population, attempted, \
     average_score, completion_rate, last_updated";

/// Computed figures of one report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportFigures {
    pub total_population: i64,
    pub attempted: i64,
    pub average_score: f64,
    pub completion_rate: f64,
}

/// `attempted / population * 100`, two places; 0 for an empty population.
pub fn completion_rate(attempted: i64, population: i64) -> f64 {
    if population <= 0 {
        return 0.0;
    }
    round2(attempted as f64 / population as f64 * 100.0)
}

/// Gathers population and attempt figures for `audience` in the quiz's department.
pub async fn compute_figures(
    pool: &PgPool,
    quiz: &Quiz,
    audience: Audience,
) -> Result<ReportFigures, sqlx::Error> {
    let (total_population,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM profiles p
        JOIN users u ON u.id = p.user_id
        WHERE p.role = $1 AND p.department = $2 AND u.is_active
        "#,
    )
    .bind(audience.as_str())
    .bind(&quiz.department)
    .fetch_one(pool)
    .await?;

    let (attempted, average): (i64, f64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COALESCE(AVG(r.score), 0)::FLOAT8
        FROM results r
        JOIN users u ON u.id = r.user_id
        JOIN profiles p ON p.user_id = u.id
        WHERE r.quiz_id = $1 AND p.role = $2 AND p.department = $3 AND u.is_active
        "#,
    )
    .bind(quiz.id)
    .bind(audience.as_str())
    .bind(&quiz.department)
    .fetch_one(pool)
    .await?;

    Ok(ReportFigures {
        total_population,
        attempted,
        average_score: round2(average),
        completion_rate: completion_rate(attempted, total_population),
    })
}

/// Creates the report row with zeroed figures if it does not exist yet.
pub async fn ensure_report(pool: &PgPool, quiz: &Quiz, audience: Audience) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO assessment_reports (quiz_id, audience, report_type)
        VALUES ($1, $2, $3)
        ON CONFLICT (quiz_id, audience) DO NOTHING
        "#,
    )
    .bind(quiz.id)
    .bind(audience.as_str())
    .bind(QuizType::report_type_for(&quiz.quiz_type).as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Recomputes and stores the report, creating it when missing.
pub async fn refresh_report(
    pool: &PgPool,
    quiz: &Quiz,
    audience: Audience,
) -> Result<AssessmentReport, sqlx::Error> {
    let figures = compute_figures(pool, quiz, audience).await?;

    sqlx::query_as::<_, AssessmentReport>(&format!(
        r#"
        INSERT INTO assessment_reports
            (quiz_id, audience, report_type, total_population, attempted,
             average_score, completion_rate, last_updated)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        ON CONFLICT (quiz_id, audience) DO UPDATE SET
            report_type = EXCLUDED.report_type,
            total_population = EXCLUDED.total_population,
            attempted = EXCLUDED.attempted,
            average_score = EXCLUDED.average_score,
            completion_rate = EXCLUDED.completion_rate,
            last_updated = NOW()
        RETURNING {REPORT_COLUMNS}
        "#
    ))
    .bind(quiz.id)
    .bind(audience.as_str())
    .bind(QuizType::report_type_for(&quiz.quiz_type).as_str())
    .bind(figures.total_population as i32)
    .bind(figures.attempted as i32)
    .bind(figures.average_score)
    .bind(figures.completion_rate)
    .fetch_one(pool)
    .await
}

/// Refreshes both audiences of a quiz.
pub async fn refresh_for_quiz(pool: &PgPool, quiz: &Quiz) -> Result<(), sqlx::Error> {
    for audience in Audience::ALL {
        refresh_report(pool, quiz, audience).await?;
    }
    Ok(())
}

/// Post-commit step after an attempt: only the learner's audience changes.
/// Failures are logged; the attempt itself already stands.
pub async fn refresh_after_attempt(pool: &PgPool, quiz: &Quiz, audience: Audience) {
    if let Err(e) = refresh_report(pool, quiz, audience).await {
        tracing::warn!(
            "Failed to refresh {} report for quiz {}: {:?}",
            audience,
            quiz.id,
            e
        );
    }
}

pub async fn find_report(pool: &PgPool, id: i64) -> Result<Option<AssessmentReport>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentReport>(&format!(
        "SELECT {REPORT_COLUMNS} FROM assessment_reports WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

/// Existing reports for a set of quizzes, optionally one audience only.
pub async fn reports_for_quizzes(
    pool: &PgPool,
    quiz_ids: &[i64],
    audience: Option<Audience>,
) -> Result<Vec<AssessmentReport>, sqlx::Error> {
    sqlx::query_as::<_, AssessmentReport>(&format!(
        r#"
        SELECT {REPORT_COLUMNS}
        FROM assessment_reports
        WHERE quiz_id = ANY($1) AND ($2::TEXT IS NULL OR audience = $2)
        ORDER BY last_updated DESC, id DESC
        "#
    ))
    .bind(quiz_ids)
    .bind(audience.map(|a| a.as_str()))
    .fetch_all(pool)
    .await
}

/// Attempts behind a report: results of the quiz by users of that role.
pub async fn attempts_for(
    pool: &PgPool,
    quiz_id: i64,
    audience: Audience,
) -> Result<Vec<AttemptRecord>, sqlx::Error> {
    sqlx::query_as::<_, AttemptRecord>(
        r#"
        SELECT
            r.id AS result_id,
            u.id AS user_id,
            u.username,
            u.role,
            p.name AS display_name,
            p.department,
            p.designation,
            r.score,
            r.date_attempted
        FROM results r
        JOIN users u ON u.id = r.user_id
        LEFT JOIN profiles p ON p.user_id = u.id
        WHERE r.quiz_id = $1 AND u.role = $2
        ORDER BY r.date_attempted DESC
        "#,
    )
    .bind(quiz_id)
    .bind(audience.as_str())
    .fetch_all(pool)
    .await
}
