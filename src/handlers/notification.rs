// src/handlers/notification.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        notification::{
            InboxParams, MarkReadRequest, Page, ReceiptView, SendNotificationRequest,
            SentListParams, SentNotification,
        },
        report::truthy,
    },
    services::{
        accounts,
        dispatch::Dispatcher,
        notify::{self, Draft},
    },
    utils::{html::clean_required, jwt::Claims},
};

/// Sends a notification to individual users or a role group.
///
/// Group mode defaults the department to the sender's own.
pub async fn send(
    State(pool): State<PgPool>,
    State(dispatcher): State<Arc<dyn Dispatcher>>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<SendNotificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let sender_id = claims.user_id()?;
    let sender_department = accounts::find_profile(&pool, sender_id)
        .await?
        .map(|p| p.department)
        .unwrap_or_default();

    let recipients =
        notify::resolve_recipients(&pool, sender_id, &sender_department, &payload).await?;
    if recipients.is_empty() {
        return Err(AppError::BadRequest("No recipients found".to_string()));
    }

    let draft = Draft {
        subject: clean_required(&payload.subject, "subject")?,
        message: clean_required(&payload.message, "message")?,
        link: payload.link.clone(),
        notification_type: payload.notification_type,
    };

    let outcome = notify::send_notification(&pool, &dispatcher, sender_id, &draft, &recipients).await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

fn push_sent_filters(builder: &mut QueryBuilder<'_, Postgres>, sender_id: i64, params: &SentListParams) {
    builder.push(" WHERE n.sent_by = ");
    builder.push_bind(sender_id);
    if let Some(search) = params.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        builder.push(" AND (n.subject ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(" OR n.message ILIKE ");
        builder.push_bind(pattern);
        builder.push(")");
    }
    if let Some(from) = params.date_from {
        builder.push(" AND n.created_at::DATE >= ");
        builder.push_bind(from);
    }
    if let Some(to) = params.date_to {
        builder.push(" AND n.created_at::DATE <= ");
        builder.push_bind(to);
    }
}

/// Notifications the caller sent, newest first, with recipient counts.
pub async fn list_sent(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<SentListParams>,
) -> Result<impl IntoResponse, AppError> {
    let (page, page_size, offset) = params
        .paging()
        .ok_or_else(|| AppError::BadRequest("Page is out of range".to_string()))?;

    let sender_id = claims.user_id()?;

    let mut count_query: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT COUNT(*) FROM notifications n");
    push_sent_filters(&mut count_query, sender_id, &params);
    let (count,): (i64,) = count_query.build_query_as().fetch_one(&pool).await?;

    let mut list_query: QueryBuilder<Postgres> = QueryBuilder::new(
        r#"
        SELECT n.id, n.subject, n.message, n.link, n.notification_type, n.sent_by, n.created_at,
               (SELECT COUNT(*) FROM notification_receipts r WHERE r.notification_id = n.id) AS recipients_count
        FROM notifications n
        "#,
    );
    push_sent_filters(&mut list_query, sender_id, &params);
    list_query.push(" ORDER BY n.created_at DESC, n.id DESC LIMIT ");
    list_query.push_bind(page_size);
    list_query.push(" OFFSET ");
    list_query.push_bind(offset);

    let results: Vec<SentNotification> = list_query
        .build_query_as()
        .fetch_all(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list sent notifications: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(Json(Page {
        count,
        page,
        page_size,
        results,
    }))
}

/// The caller's received notifications, newest first. `unread=true` filters.
pub async fn inbox(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<InboxParams>,
) -> Result<impl IntoResponse, AppError> {
    let receipts = sqlx::query_as::<_, ReceiptView>(
        r#"
        SELECT n.id AS notification_id, n.subject, n.message, n.link, n.notification_type,
               s.username AS sent_by_username, r.is_read, r.read_at, r.delivered_at
        FROM notification_receipts r
        JOIN notifications n ON n.id = r.notification_id
        LEFT JOIN users s ON s.id = n.sent_by
        WHERE r.user_id = $1 AND NOT r.archived AND ($2 = FALSE OR NOT r.is_read)
        ORDER BY r.delivered_at DESC, n.id DESC
        "#,
    )
    .bind(claims.user_id()?)
    .bind(truthy(params.unread.as_deref()))
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load inbox: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(receipts))
}

/// Marks one of the caller's receipts as read. Already-read receipts keep their timestamp.
pub async fn mark_read(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query(
        r#"
        UPDATE notification_receipts
        SET is_read = TRUE, read_at = COALESCE(read_at, NOW())
        WHERE notification_id = $1 AND user_id = $2
        "#,
    )
    .bind(payload.notification_id)
    .bind(claims.user_id()?)
    .execute(&pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Notification not found".to_string()));
    }

    Ok(Json(json!({ "notification_id": payload.notification_id, "is_read": true })))
}
