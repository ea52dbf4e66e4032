// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    error::AppError,
    models::{report::truthy, user::{Role, UserSummary}},
    utils::jwt::Claims,
};

/// Query parameters for the user listing.
#[derive(Debug, Default, Deserialize)]
pub struct UserListParams {
    pub role: Option<String>,
    /// `true` lists only accounts awaiting activation.
    pub pending: Option<String>,
}

/// Lists users with their profile fields.
/// Admin only.
pub async fn list_users(
    State(pool): State<PgPool>,
    Query(params): Query<UserListParams>,
) -> Result<impl IntoResponse, AppError> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT u.id, u.username, u.email, u.role, u.is_active,
               p.name, p.department, p.designation, u.created_at
        FROM users u
        LEFT JOIN profiles p ON p.user_id = u.id
        WHERE TRUE
        "#,
    );

    if let Some(role) = params.role.as_deref() {
        let role: Role = role.parse().map_err(AppError::BadRequest)?;
        builder.push(" AND u.role = ");
        builder.push_bind(role.as_str());
    }

    if truthy(params.pending.as_deref()) {
        builder.push(" AND NOT u.is_active");
    }

    builder.push(" ORDER BY u.id DESC");

    let users: Vec<UserSummary> = builder
        .build_query_as()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list users: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct ActivationRequest {
    pub is_active: bool,
}

/// Activates or deactivates an account.
/// Admin only. An admin cannot deactivate themselves.
pub async fn set_activation(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<ActivationRequest>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? && !payload.is_active {
        return Err(AppError::BadRequest("Cannot deactivate yourself".to_string()));
    }

    let result = sqlx::query("UPDATE users SET is_active = $1 WHERE id = $2")
        .bind(payload.is_active)
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update activation of user {}: {:?}", id, e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tracing::info!(
        "Admin {} set is_active={} on user {}",
        claims.username,
        payload.is_active,
        id
    );

    Ok(Json(json!({ "id": id, "is_active": payload.is_active })))
}

/// Deletes a user by ID.
/// Admin only. Prevents deleting self.
pub async fn delete_user(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    if id == claims.user_id()? {
        return Err(AppError::BadRequest("Cannot delete yourself".to_string()));
    }

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete user: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Headline counts for the admin dashboard.
pub async fn dashboard(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let by_role: Vec<(String, i64)> =
        sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
            .fetch_all(&pool)
            .await?;

    let (pending, quizzes, results): (i64, i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM users WHERE NOT is_active),
            (SELECT COUNT(*) FROM quizzes),
            (SELECT COUNT(*) FROM results)
        "#,
    )
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load admin dashboard: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let users_by_role: serde_json::Map<String, serde_json::Value> = by_role
        .into_iter()
        .map(|(role, count)| (role, json!(count)))
        .collect();

    Ok(Json(json!({
        "users_by_role": users_by_role,
        "pending_approvals": pending,
        "total_quizzes": quizzes,
        "total_results": results,
    })))
}
