// src/models/activity.rs

use serde::Serialize;
use sqlx::FromRow;

/// Represents the 'login_activities' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LoginActivity {
    pub id: i64,
    pub user_id: Option<i64>,
    pub username: String,
    pub login_ip: Option<String>,
    pub login_datetime: chrono::DateTime<chrono::Utc>,
    /// 'S' for success, 'F' for failure.
    pub status: String,
    pub user_agent: String,
    pub login_num: i64,
}

/// Logins and estimated minutes spent on one calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyLogin {
    pub date: chrono::NaiveDate,
    pub login_count: i64,
    pub time_spent_minutes: i64,
}

#[derive(Debug, Serialize)]
pub struct LoginSummary {
    pub name: String,
    pub department: String,
    pub total_logins: i64,
    pub login_summary: Vec<DailyLogin>,
}

/// Most recent login of a learner, shown on the trainer dashboard.
#[derive(Debug, Serialize, FromRow)]
pub struct RecentLogin {
    pub username: String,
    pub login_date: chrono::NaiveDate,
}
