// src/handlers/auth.rs

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    config::Config,
    error::{AppError, conflict_or_internal},
    models::user::{LoginRequest, RegisterRequest, Role, User},
    services::{
        accounts, activity,
        dispatch::{self, Dispatcher, EmailMessage},
    },
    utils::{
        client::ClientInfo,
        hash::{hash_password, verify_password},
        jwt::sign_jwt,
    },
};

/// Registers a new user together with its profile.
///
/// * The account starts inactive; an admin must activate it before login.
/// * Admin accounts cannot be self-registered.
/// * A welcome email is queued after commit.
pub async fn register(
    State(pool): State<PgPool>,
    State(dispatcher): State<Arc<dyn Dispatcher>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if payload.role == Role::Admin {
        return Err(AppError::Forbidden(
            "Admin accounts cannot be self-registered".to_string(),
        ));
    }

    let username = payload.username.trim().to_string();
    let email = payload.email.trim().to_lowercase();
    let hashed_password = hash_password(&payload.password)?;

    let trainer_id = match (payload.role, payload.trainer_id) {
        (Role::Trainee, Some(id)) => {
            let trainer = accounts::find_user(&pool, id).await?;
            Some(accounts::ensure_trainer(trainer)?.id)
        }
        _ => None,
    };

    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        r#"
        INSERT INTO users (username, email, password, role, is_active)
        VALUES ($1, $2, $3, $4, FALSE)
        RETURNING id, username, email, password, role, is_active, created_at
        "#,
    )
    .bind(&username)
    .bind(&email)
    .bind(&hashed_password)
    .bind(payload.role.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| conflict_or_internal(e, "Username or email already exists"))?;

    sqlx::query(
        r#"
        INSERT INTO profiles (user_id, role, name, employee_id, department, designation, trainer_id, expertise)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(user.id)
    .bind(payload.role.as_str())
    .bind(payload.name.trim())
    .bind(payload.employee_id.trim())
    .bind(payload.department.trim())
    .bind(payload.designation.trim())
    .bind(trainer_id)
    .bind(payload.expertise.as_deref().unwrap_or_default())
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create profile for {}: {:?}", username, e);
        AppError::from(e)
    })?;

    tx.commit().await?;

    tracing::info!("Registered {} as {}", user.username, user.role);

    dispatch::email_fire_and_forget(
        &dispatcher,
        EmailMessage {
            to: user.email.clone(),
            subject: "Welcome to the LMS".to_string(),
            body: format!(
                "Hello {},\n\nYour {} account has been created and is awaiting approval by an administrator.",
                user.username, user.role
            ),
        },
    );

    Ok((StatusCode::CREATED, Json(user)))
}

/// Authenticates a user and returns a JWT token.
///
/// * Unknown users and wrong passwords are both 401.
/// * Inactive accounts are 403.
/// * Successful logins are recorded in `login_activities`.
pub async fn login(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    client: ClientInfo,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let user = accounts::find_user_by_username(&pool, payload.username.trim())
        .await
        .map_err(|e| {
            tracing::error!("Login DB error: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or(AppError::AuthError("Invalid credentials".to_string()))?;

    if !verify_password(&payload.password, &user.password)? {
        return Err(AppError::AuthError("Invalid credentials".to_string()));
    }

    if !user.is_active {
        return Err(AppError::Forbidden(
            "Account is not active yet. Please wait for admin approval.".to_string(),
        ));
    }

    let role: Role = user
        .role
        .parse()
        .map_err(|e: String| AppError::InternalServerError(e))?;

    let token = sign_jwt(
        user.id,
        &user.username,
        role,
        &config.jwt_secret,
        config.jwt_expiration,
    )?;

    let login_num = activity::record_login(&pool, user.id, &user.username, &client)
        .await
        .map_err(|e| {
            tracing::error!("Failed to record login for {}: {:?}", user.username, e);
            AppError::from(e)
        })?;

    tracing::info!("{} logged in (#{})", user.username, login_num);

    Ok(Json(json!({
        "token": token,
        "type": "Bearer",
        "username": user.username,
        "role": role,
        "dashboard_url": role.dashboard_url(&user.username),
    })))
}
