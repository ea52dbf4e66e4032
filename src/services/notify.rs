// src/services/notify.rs

use std::{collections::HashSet, sync::Arc};

use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::{
    config::RECEIPT_BATCH_SIZE,
    error::AppError,
    models::notification::{Notification, NotificationType, Recipient, SendMode, SendNotificationRequest},
    services::dispatch::{self, Dispatcher, EmailMessage, PushMessage},
};

/// Counts reported back to the sender.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SendOutcome {
    pub notification_id: i64,
    pub total_recipients: usize,
    pub queued_email: usize,
    pub queued_push: usize,
}

/// Content of a notification about to be sent.
#[derive(Debug, Clone)]
pub struct Draft {
    pub subject: String,
    pub message: String,
    pub link: Option<String>,
    pub notification_type: NotificationType,
}

/// Trims, drops blanks and duplicates, keeping first-seen order.
pub fn normalize_usernames(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .filter(|u| seen.insert(u.to_string()))
        .map(str::to_string)
        .collect()
}

/// Resolves the recipients of a send request. The sender is never a recipient.
pub async fn resolve_recipients(
    pool: &PgPool,
    sender_id: i64,
    sender_department: &str,
    req: &SendNotificationRequest,
) -> Result<Vec<Recipient>, AppError> {
    let recipients = match req.mode {
        SendMode::Individual => {
            let usernames = normalize_usernames(&req.usernames);
            if usernames.is_empty() {
                return Err(AppError::BadRequest(
                    "usernames are required for individual notifications".to_string(),
                ));
            }
            sqlx::query_as::<_, Recipient>(
                r#"
                SELECT id, email, role
                FROM users
                WHERE username = ANY($1) AND is_active AND id <> $2
                ORDER BY id
                "#,
            )
            .bind(&usernames)
            .bind(sender_id)
            .fetch_all(pool)
            .await?
        }
        SendMode::Group => {
            let department = req
                .department
                .as_deref()
                .map(str::trim)
                .filter(|d| !d.is_empty())
                .unwrap_or(sender_department);
            let roles: Vec<&str> = req.audience.roles().to_vec();
            sqlx::query_as::<_, Recipient>(
                r#"
                SELECT u.id, u.email, u.role
                FROM users u
                JOIN profiles p ON p.user_id = u.id
                WHERE u.role = ANY($1) AND u.is_active AND p.department = $2 AND u.id <> $3
                ORDER BY u.id
                "#,
            )
            .bind(&roles)
            .bind(department)
            .bind(sender_id)
            .fetch_all(pool)
            .await?
        }
    };

    Ok(dedupe_recipients(recipients))
}

fn dedupe_recipients(recipients: Vec<Recipient>) -> Vec<Recipient> {
    let mut seen = HashSet::new();
    recipients.into_iter().filter(|r| seen.insert(r.id)).collect()
}

/// Stores the notification and one receipt per recipient in one transaction,
/// then queues push and email per recipient.
pub async fn send_notification(
    pool: &PgPool,
    dispatcher: &Arc<dyn Dispatcher>,
    sender_id: i64,
    draft: &Draft,
    recipients: &[Recipient],
) -> Result<SendOutcome, AppError> {
    let mut tx = pool.begin().await?;

    let notification = sqlx::query_as::<_, Notification>(
        r#"
        INSERT INTO notifications (subject, message, link, notification_type, sent_by)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, subject, message, link, notification_type, sent_by, created_at
        "#,
    )
    .bind(&draft.subject)
    .bind(&draft.message)
    .bind(&draft.link)
    .bind(draft.notification_type.as_str())
    .bind(sender_id)
    .fetch_one(&mut *tx)
    .await?;

    for batch in recipients.chunks(RECEIPT_BATCH_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO notification_receipts (notification_id, user_id) ");
        builder.push_values(batch, |mut row, recipient| {
            row.push_bind(notification.id).push_bind(recipient.id);
        });
        builder.push(" ON CONFLICT (notification_id, user_id) DO NOTHING");
        builder.build().execute(&mut *tx).await?;
    }

    tx.commit().await?;

    let mut queued_email = 0;
    for recipient in recipients {
        dispatch::push_fire_and_forget(
            dispatcher,
            PushMessage {
                user_id: recipient.id,
                title: draft.subject.clone(),
                body: draft.message.clone(),
                link: draft.link.clone(),
            },
        );
        if !recipient.email.trim().is_empty() {
            let body = match &draft.link {
                Some(link) => format!("{}\n\n{}", draft.message, link),
                None => draft.message.clone(),
            };
            dispatch::email_fire_and_forget(
                dispatcher,
                EmailMessage {
                    to: recipient.email.clone(),
                    subject: draft.subject.clone(),
                    body,
                },
            );
            queued_email += 1;
        }
    }

    tracing::info!(
        "Notification {} sent by user {} to {} recipients",
        notification.id,
        sender_id,
        recipients.len()
    );

    Ok(SendOutcome {
        notification_id: notification.id,
        total_recipients: recipients.len(),
        queued_email,
        queued_push: recipients.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usernames_are_trimmed_and_deduplicated() {
        let raw = vec![
            " amy ".to_string(),
            "bob".to_string(),
            "".to_string(),
            "amy".to_string(),
            "   ".to_string(),
        ];
        assert_eq!(normalize_usernames(&raw), vec!["amy", "bob"]);
    }

    #[test]
    fn recipients_are_deduplicated_by_id() {
        let r = |id| Recipient {
            id,
            email: format!("{id}@example.com"),
            role: "trainee".into(),
        };
        let out = dedupe_recipients(vec![r(1), r(2), r(1)]);
        assert_eq!(out.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
    }
}
