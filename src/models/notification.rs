// src/models/notification.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::config::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Assessment,
    Module,
    Info,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Assessment => "assessment",
            NotificationType::Module => "module",
            NotificationType::Info => "info",
        }
    }
}

/// How recipients are selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// Explicit usernames.
    Individual,
    /// Role filter, optionally scoped to a department.
    Group,
}

/// Who a group notification targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifyAudience {
    Employee,
    Trainee,
    Both,
}

impl NotifyAudience {
    pub fn roles(&self) -> &'static [&'static str] {
        match self {
            NotifyAudience::Employee => &["employee"],
            NotifyAudience::Trainee => &["trainee"],
            NotifyAudience::Both => &["employee", "trainee"],
        }
    }
}

/// Represents the 'notifications' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Notification {
    pub id: i64,
    pub subject: String,
    pub message: String,
    pub link: Option<String>,
    pub notification_type: String,
    pub sent_by: Option<i64>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A sent notification with its recipient count.
#[derive(Debug, Serialize, FromRow)]
pub struct SentNotification {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub notification: Notification,
    pub recipients_count: i64,
}

/// A receipt joined with its notification, as seen by the recipient.
#[derive(Debug, Serialize, FromRow)]
pub struct ReceiptView {
    pub notification_id: i64,
    pub subject: String,
    pub message: String,
    pub link: Option<String>,
    pub notification_type: String,
    pub sent_by_username: Option<String>,
    pub is_read: bool,
    pub read_at: Option<chrono::DateTime<chrono::Utc>>,
    pub delivered_at: chrono::DateTime<chrono::Utc>,
}

/// A resolved recipient of a fan-out.
#[derive(Debug, Clone, FromRow)]
pub struct Recipient {
    pub id: i64,
    pub email: String,
    pub role: String,
}

/// DTO for sending a notification.
#[derive(Debug, Deserialize, Validate)]
pub struct SendNotificationRequest {
    #[validate(length(min = 1, max = 255))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    #[validate(url)]
    pub link: Option<String>,
    #[serde(default = "default_type")]
    pub notification_type: NotificationType,
    pub mode: SendMode,
    #[serde(default = "default_audience")]
    pub audience: NotifyAudience,
    pub department: Option<String>,
    #[serde(default)]
    pub usernames: Vec<String>,
}

fn default_type() -> NotificationType {
    NotificationType::Info
}

fn default_audience() -> NotifyAudience {
    NotifyAudience::Both
}

/// Query parameters for listing sent notifications.
#[derive(Debug, Default, Deserialize)]
pub struct SentListParams {
    pub search: Option<String>,
    pub date_from: Option<chrono::NaiveDate>,
    pub date_to: Option<chrono::NaiveDate>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl SentListParams {
    /// `(page, page_size, offset)`. Page size is clamped to `1..=MAX_PAGE_SIZE`;
    /// `None` when the offset does not fit in an i64.
    pub fn paging(&self) -> Option<(i64, i64, i64)> {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self
            .page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        let offset = (page - 1).checked_mul(page_size)?;
        Some((page, page_size, offset))
    }
}

/// Query parameters for a recipient's inbox.
#[derive(Debug, Default, Deserialize)]
pub struct InboxParams {
    pub unread: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadRequest {
    pub notification_id: i64,
}

/// Paginated envelope.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: i64,
    pub page: i64,
    pub page_size: i64,
    pub results: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(page: Option<i64>, page_size: Option<i64>) -> SentListParams {
        SentListParams {
            page,
            page_size,
            ..Default::default()
        }
    }

    #[test]
    fn paging_defaults_and_clamps() {
        assert_eq!(params(None, None).paging(), Some((1, DEFAULT_PAGE_SIZE, 0)));
        assert_eq!(params(Some(-4), Some(0)).paging(), Some((1, 1, 0)));
        assert_eq!(params(Some(3), Some(10_000)).paging(), Some((3, MAX_PAGE_SIZE, 2 * MAX_PAGE_SIZE)));
    }

    #[test]
    fn huge_page_is_rejected_not_wrapped() {
        assert_eq!(params(Some(i64::MAX), Some(200)).paging(), None);
    }
}
