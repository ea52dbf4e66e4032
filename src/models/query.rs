// src/models/query.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryCategory {
    Assessment,
    Training,
    General,
}

impl QueryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryCategory::Assessment => "assessment",
            QueryCategory::Training => "training",
            QueryCategory::General => "general",
        }
    }
}

/// Represents the 'queries' table: a support question raised by a learner.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Query {
    pub id: i64,
    pub raised_by: i64,
    pub assigned_trainer: Option<i64>,
    pub question: String,
    pub category: String,
    pub is_resolved: bool,
    pub raised_by_role: String,
    pub department: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'query_responses' table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QueryResponse {
    pub id: i64,
    pub query_id: i64,
    pub responder: i64,
    pub responder_username: String,
    pub response: String,
    pub responded_at: chrono::DateTime<chrono::Utc>,
}

/// A query with its thread of responses.
#[derive(Debug, Serialize)]
pub struct QueryThread {
    #[serde(flatten)]
    pub query: Query,
    pub raised_by_username: String,
    pub responses: Vec<QueryResponse>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateQueryRequest {
    #[validate(length(min = 1, max = 5000))]
    pub question: String,
    #[serde(default = "default_category")]
    pub category: QueryCategory,
}

fn default_category() -> QueryCategory {
    QueryCategory::General
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateResponseRequest {
    #[validate(length(min = 1, max = 5000))]
    pub response: String,
}

/// Trainer reference: numeric id or username.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum TrainerRef {
    Id(i64),
    Username(String),
}

#[derive(Debug, Deserialize)]
pub struct AssignTrainerRequest {
    pub assigned_trainer: TrainerRef,
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    #[serde(default = "resolved_default")]
    pub is_resolved: bool,
}

fn resolved_default() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trainer_ref_accepts_id_or_username() {
        let by_id: AssignTrainerRequest =
            serde_json::from_str(r#"{"assigned_trainer": 7}"#).unwrap();
        assert!(matches!(by_id.assigned_trainer, TrainerRef::Id(7)));

        let by_name: AssignTrainerRequest =
            serde_json::from_str(r#"{"assigned_trainer": "coach"}"#).unwrap();
        assert!(matches!(by_name.assigned_trainer, TrainerRef::Username(ref u) if u == "coach"));
    }

    #[test]
    fn category_defaults_to_general() {
        let req: CreateQueryRequest = serde_json::from_str(r#"{"question": "Help?"}"#).unwrap();
        assert_eq!(req.category, QueryCategory::General);
    }
}
