// src/services/accounts.rs
//
// Lookups shared across handlers.

use sqlx::PgPool;

use crate::{
    error::AppError,
    models::user::{Profile, Role, User},
};

const USER_COLUMNS: &str = "id, username, email, password, role, is_active, created_at";

pub async fn find_user(pool: &PgPool, id: i64) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn find_profile(pool: &PgPool, user_id: i64) -> Result<Option<Profile>, sqlx::Error> {
    sqlx::query_as::<_, Profile>(
        r#"
        SELECT user_id, role, name, employee_id, department, designation, trainer_id, expertise
        FROM profiles
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

/// Profile of the caller, `NotFound` when missing.
pub async fn require_profile(pool: &PgPool, user_id: i64) -> Result<Profile, AppError> {
    find_profile(pool, user_id)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load profile {}: {:?}", user_id, e);
            AppError::from(e)
        })?
        .ok_or_else(|| AppError::NotFound("Profile not found".to_string()))
}

/// Resolves a user that must hold the trainer role.
pub fn ensure_trainer(user: Option<User>) -> Result<User, AppError> {
    let user = user.ok_or_else(|| AppError::NotFound("Trainer not found".to_string()))?;
    if user.role != Role::Trainer.as_str() {
        return Err(AppError::BadRequest(format!(
            "User '{}' is not a trainer",
            user.username
        )));
    }
    Ok(user)
}

/// First active trainer of a department, by id.
pub async fn department_trainer(
    pool: &PgPool,
    department: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.email, u.password, u.role, u.is_active, u.created_at
        FROM users u
        JOIN profiles p ON p.user_id = u.id
        WHERE u.role = 'trainer' AND u.is_active AND p.department = $1
        ORDER BY u.id
        LIMIT 1
        "#,
    )
    .bind(department)
    .fetch_optional(pool)
    .await
}
