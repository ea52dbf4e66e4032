// src/handlers/query.rs

use std::{collections::HashMap, sync::Arc};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        query::{
            AssignTrainerRequest, CreateQueryRequest, CreateResponseRequest, Query, QueryResponse,
            QueryThread, ResolveRequest, TrainerRef,
        },
        user::Role,
    },
    services::{
        accounts,
        dispatch::{self, Dispatcher, EmailMessage},
    },
    utils::{html::clean_required, jwt::Claims},
};

const QUERY_COLUMNS: &str = "id, raised_by, assigned_trainer, question, category, is_resolved, \
     raised_by_role, department, created_at";

async fn find_query(pool: &PgPool, id: i64) -> Result<Query, AppError> {
    sqlx::query_as::<_, Query>(&format!("SELECT {QUERY_COLUMNS} FROM queries WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Query not found".to_string()))
}

/// Attaches responses and the raiser's username to each query.
async fn threads(pool: &PgPool, queries: Vec<Query>) -> Result<Vec<QueryThread>, AppError> {
    let ids: Vec<i64> = queries.iter().map(|q| q.id).collect();

    let responses = sqlx::query_as::<_, QueryResponse>(
        r#"
        SELECT r.id, r.query_id, r.responder, u.username AS responder_username, r.response, r.responded_at
        FROM query_responses r
        JOIN users u ON u.id = r.responder
        WHERE r.query_id = ANY($1)
        ORDER BY r.responded_at, r.id
        "#,
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let usernames: Vec<(i64, String)> =
        sqlx::query_as("SELECT q.id, u.username FROM queries q JOIN users u ON u.id = q.raised_by WHERE q.id = ANY($1)")
            .bind(&ids)
            .fetch_all(pool)
            .await?;

    let mut by_query: HashMap<i64, Vec<QueryResponse>> = HashMap::new();
    for response in responses {
        by_query.entry(response.query_id).or_default().push(response);
    }
    let usernames: HashMap<i64, String> = usernames.into_iter().collect();

    Ok(queries
        .into_iter()
        .map(|query| QueryThread {
            raised_by_username: usernames.get(&query.id).cloned().unwrap_or_default(),
            responses: by_query.remove(&query.id).unwrap_or_default(),
            query,
        })
        .collect())
}

async fn insert_response(
    pool: &PgPool,
    query_id: i64,
    responder: i64,
    text: &str,
) -> Result<i64, AppError> {
    let (id,): (i64,) = sqlx::query_as(
        "INSERT INTO query_responses (query_id, responder, response) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(query_id)
    .bind(responder)
    .bind(text)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to store response to query {}: {:?}", query_id, e);
        AppError::InternalServerError(e.to_string())
    })?;
    Ok(id)
}

/// Raises a query. Department and role are copied from the learner's profile;
/// the department's first trainer is emailed.
pub async fn raise_query(
    State(pool): State<PgPool>,
    State(dispatcher): State<Arc<dyn Dispatcher>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateQueryRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let question = clean_required(&payload.question, "question")?;

    let user_id = claims.user_id()?;
    let profile = accounts::require_profile(&pool, user_id).await?;

    let query = sqlx::query_as::<_, Query>(&format!(
        r#"
        INSERT INTO queries (raised_by, question, category, raised_by_role, department)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING {QUERY_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(&question)
    .bind(payload.category.as_str())
    .bind(&profile.role)
    .bind(&profile.department)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to raise query: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    match accounts::department_trainer(&pool, &profile.department).await {
        Ok(Some(trainer)) => dispatch::email_fire_and_forget(
            &dispatcher,
            EmailMessage {
                to: trainer.email,
                subject: format!("New {} query from {}", query.category, claims.username),
                body: question,
            },
        ),
        Ok(None) => tracing::info!("No trainer in {} to notify of query {}", profile.department, query.id),
        Err(e) => tracing::warn!("Failed to look up trainer for query {}: {:?}", query.id, e),
    }

    Ok((StatusCode::CREATED, Json(query)))
}

/// Queries the learner raised, newest first, with their responses.
pub async fn my_queries(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let queries = sqlx::query_as::<_, Query>(&format!(
        "SELECT {QUERY_COLUMNS} FROM queries WHERE raised_by = $1 ORDER BY created_at DESC, id DESC"
    ))
    .bind(claims.user_id()?)
    .fetch_all(&pool)
    .await?;

    Ok(Json(threads(&pool, queries).await?))
}

/// Learner follow-up on a query they raised.
pub async fn learner_respond(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateResponseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;
    let query = find_query(&pool, id).await?;

    if query.raised_by != user_id {
        return Err(AppError::Forbidden(
            "You can only respond to your own queries".to_string(),
        ));
    }

    let text = clean_required(&payload.response, "response")?;
    let response_id = insert_response(&pool, query.id, user_id, &text).await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": response_id }))))
}

/// All queries, newest first, with responses. Trainer or admin.
pub async fn all_queries(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let queries = sqlx::query_as::<_, Query>(&format!(
        "SELECT {QUERY_COLUMNS} FROM queries ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list queries: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(threads(&pool, queries).await?))
}

/// Assigns an unassigned query to `trainer_id`. Returns false when another
/// trainer holds it, including one that claimed it after it was read.
pub async fn claim_query(pool: &PgPool, query_id: i64, trainer_id: i64) -> Result<bool, sqlx::Error> {
    let holder: Option<(Option<i64>,)> = sqlx::query_as(
        r#"
        UPDATE queries SET assigned_trainer = COALESCE(assigned_trainer, $1)
        WHERE id = $2
        RETURNING assigned_trainer
        "#,
    )
    .bind(trainer_id)
    .bind(query_id)
    .fetch_optional(pool)
    .await?;

    Ok(matches!(holder, Some((Some(holder),)) if holder == trainer_id))
}

/// Trainer response. An unassigned query is claimed by the responder;
/// one assigned to another trainer is off limits (admins excepted).
pub async fn trainer_respond(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(payload): Json<CreateResponseRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    let user_id = claims.user_id()?;
    let is_admin = claims.role()? == Role::Admin;
    let query = find_query(&pool, id).await?;

    match query.assigned_trainer {
        None if !is_admin => {
            if !claim_query(&pool, query.id, user_id).await? {
                return Err(AppError::Forbidden(
                    "This query is assigned to another trainer".to_string(),
                ));
            }
        }
        Some(assigned) if assigned != user_id && !is_admin => {
            return Err(AppError::Forbidden(
                "This query is assigned to another trainer".to_string(),
            ));
        }
        _ => {}
    }

    let text = clean_required(&payload.response, "response")?;
    let response_id = insert_response(&pool, query.id, user_id, &text).await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": response_id }))))
}

/// Assigns a trainer by id or username. Trainer or admin.
pub async fn assign_trainer(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<AssignTrainerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let query = find_query(&pool, id).await?;

    let trainer = match &payload.assigned_trainer {
        TrainerRef::Id(trainer_id) => accounts::find_user(&pool, *trainer_id).await?,
        TrainerRef::Username(username) => {
            accounts::find_user_by_username(&pool, username.trim()).await?
        }
    };
    let trainer = accounts::ensure_trainer(trainer)?;

    let updated = sqlx::query_as::<_, Query>(&format!(
        "UPDATE queries SET assigned_trainer = $1 WHERE id = $2 RETURNING {QUERY_COLUMNS}"
    ))
    .bind(trainer.id)
    .bind(query.id)
    .fetch_one(&pool)
    .await?;

    tracing::info!("Query {} assigned to {}", query.id, trainer.username);

    Ok(Json(updated))
}

/// Marks a query resolved (or reopens it with `is_resolved: false`).
pub async fn resolve_query(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<ResolveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let updated = sqlx::query_as::<_, Query>(&format!(
        "UPDATE queries SET is_resolved = $1 WHERE id = $2 RETURNING {QUERY_COLUMNS}"
    ))
    .bind(payload.is_resolved)
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Query not found".to_string()))?;

    Ok(Json(updated))
}
