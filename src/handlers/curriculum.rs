// src/handlers/curriculum.rs

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::{AppError, conflict_or_internal},
    models::curriculum::{
        CreateLessonRequest, CreateSubjectRequest, Lesson, LessonWithProgress, Subject,
    },
    services::accounts,
    utils::{
        jwt::Claims,
        slug::{lesson_slug, slugify},
    },
};

const SUBJECT_COLUMNS: &str =
    "id, subject_id, name, slug, department, description, display_on_frontend, is_new";

const LESSON_SELECT: &str = r#"
    SELECT l.id, l.lesson_id, l.subject_id, l.department, l.name, l.position, l.slug,
           l.tutorial_video, l.quiz_link, l.content, l.editor, l.display_on_frontend, l.is_new,
           s.name AS subject_name,
           COALESCE(lc.completed, FALSE) AS completed
    FROM lessons l
    JOIN subjects s ON s.id = l.subject_id
    LEFT JOIN lesson_completions lc ON lc.lesson_id = l.id AND lc.user_id = $1
"#;

/// Lists subjects of the learner's department.
pub async fn list_subjects(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let profile = accounts::require_profile(&pool, claims.user_id()?).await?;

    let subjects = sqlx::query_as::<_, Subject>(&format!(
        "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE department = $1 AND display_on_frontend ORDER BY name"
    ))
    .bind(&profile.department)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list subjects: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(subjects))
}

/// Lists lessons of a subject, in chapter order, with the learner's progress.
pub async fn list_lessons(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(subject_slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let profile = accounts::require_profile(&pool, user_id).await?;

    let subject = sqlx::query_as::<_, Subject>(&format!(
        "SELECT {SUBJECT_COLUMNS} FROM subjects WHERE slug = $1 AND department = $2"
    ))
    .bind(&subject_slug)
    .bind(&profile.department)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Subject not found".to_string()))?;

    let lessons = sqlx::query_as::<_, LessonWithProgress>(&format!(
        "{LESSON_SELECT} WHERE l.subject_id = $2 AND l.department = $3 AND l.display_on_frontend ORDER BY l.position, l.id"
    ))
    .bind(user_id)
    .bind(subject.id)
    .bind(&profile.department)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list lessons of {}: {:?}", subject_slug, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(json!({
        "subject": subject,
        "lessons": lessons,
    })))
}

/// Lesson detail by slug, limited to the learner's department.
pub async fn get_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let profile = accounts::require_profile(&pool, user_id).await?;

    let lesson = sqlx::query_as::<_, LessonWithProgress>(&format!(
        "{LESSON_SELECT} WHERE l.slug = $2 AND l.department = $3"
    ))
    .bind(user_id)
    .bind(&slug)
    .bind(&profile.department)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))?;

    Ok(Json(lesson))
}

/// Marks a lesson complete for the learner. Repeating the call is a no-op.
pub async fn complete_lesson(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;
    let profile = accounts::require_profile(&pool, user_id).await?;

    let lesson: Option<(i64, String)> =
        sqlx::query_as("SELECT id, department FROM lessons WHERE slug = $1")
            .bind(&slug)
            .fetch_optional(&pool)
            .await?;
    let (lesson_id, department) =
        lesson.ok_or_else(|| AppError::NotFound("Lesson not found".to_string()))?;

    if department != profile.department {
        return Err(AppError::Forbidden(
            "Lesson belongs to another department".to_string(),
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO lesson_completions (user_id, lesson_id, completed, completed_at)
        VALUES ($1, $2, TRUE, NOW())
        ON CONFLICT (user_id, lesson_id) DO UPDATE SET
            completed = TRUE,
            completed_at = COALESCE(lesson_completions.completed_at, EXCLUDED.completed_at)
        "#,
    )
    .bind(user_id)
    .bind(lesson_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to mark lesson {} complete: {:?}", slug, e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(json!({ "lesson": slug, "completed": true })))
}

/// Creates a subject. Trainer or admin.
pub async fn create_subject(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateSubjectRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let slug = slugify(&payload.name);
    if slug.is_empty() {
        return Err(AppError::BadRequest("Subject name must contain letters or digits".to_string()));
    }

    let subject = sqlx::query_as::<_, Subject>(&format!(
        r#"
        INSERT INTO subjects (subject_id, name, slug, department, description, display_on_frontend, is_new)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {SUBJECT_COLUMNS}
        "#
    ))
    .bind(payload.subject_id.trim())
    .bind(payload.name.trim())
    .bind(&slug)
    .bind(payload.department.trim())
    .bind(&payload.description)
    .bind(payload.display_on_frontend)
    .bind(payload.is_new)
    .fetch_one(&pool)
    .await
    .map_err(|e| conflict_or_internal(e, "Subject id or slug already exists"))?;

    Ok((StatusCode::CREATED, Json(subject)))
}

/// Creates a lesson; department is inherited from the subject. Trainer or admin.
pub async fn create_lesson(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateLessonRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let department: Option<(String,)> =
        sqlx::query_as("SELECT department FROM subjects WHERE id = $1")
            .bind(payload.subject_id)
            .fetch_optional(&pool)
            .await?;
    let (department,) =
        department.ok_or_else(|| AppError::NotFound("Subject not found".to_string()))?;

    let lesson = sqlx::query_as::<_, Lesson>(
        r#"
        INSERT INTO lessons
            (lesson_id, subject_id, department, name, position, slug,
             tutorial_video, quiz_link, content, editor, display_on_frontend, is_new)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING id, lesson_id, subject_id, department, name, position, slug,
                  tutorial_video, quiz_link, content, editor, display_on_frontend, is_new
        "#,
    )
    .bind(payload.lesson_id.trim())
    .bind(payload.subject_id)
    .bind(&department)
    .bind(payload.name.trim())
    .bind(payload.position)
    .bind(lesson_slug(payload.position, &payload.name))
    .bind(&payload.tutorial_video)
    .bind(&payload.quiz_link)
    .bind(&payload.content)
    .bind(&payload.editor)
    .bind(payload.display_on_frontend)
    .bind(payload.is_new)
    .fetch_one(&pool)
    .await
    .map_err(|e| conflict_or_internal(e, "Lesson id or slug already exists"))?;

    Ok((StatusCode::CREATED, Json(lesson)))
}
