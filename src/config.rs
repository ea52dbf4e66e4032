// src/config.rs

use std::env;
use dotenvy::dotenv;

/// Longest gap between two logins still counted as time spent, in minutes.
pub const SESSION_CAP_MINUTES: i64 = 30;

/// Minutes credited to the most recent session of a login summary.
pub const LAST_SESSION_MINUTES: i64 = 10;

/// Correct-answer placeholder for questions that have no answer flagged correct.
pub const MISSING_CORRECT_ANSWER: &str = "N/A";

/// Receipts are inserted in batches of this size during notification fan-out.
pub const RECEIPT_BATCH_SIZE: usize = 2000;

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub admin_username: Option<String>,
    pub admin_password: Option<String>,
    pub admin_email: Option<String>,
    pub bind_addr: String,
    pub media_root: String,
    pub cors_origins: Vec<String>,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    pub push_api_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(86_400);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let cors_origins = env::var("CORS_ORIGINS")
            .map(|v| parse_list(&v))
            .unwrap_or_else(|_| {
                vec![
                    "http://localhost:3000".to_string(),
                    "http://127.0.0.1:3000".to_string(),
                ]
            });

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            admin_username: optional("ADMIN_USERNAME"),
            admin_password: optional("ADMIN_PASSWORD"),
            admin_email: optional("ADMIN_EMAIL"),
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            media_root: env::var("MEDIA_ROOT").unwrap_or_else(|_| "media".to_string()),
            cors_origins,
            mail_api_url: optional("MAIL_API_URL"),
            mail_api_key: optional("MAIL_API_KEY"),
            mail_from: env::var("MAIL_FROM").unwrap_or_else(|_| "LMS <noreply@lms.local>".to_string()),
            push_api_url: optional("PUSH_API_URL"),
        }
    }
}

/// Reads an env var, treating empty values as unset.
fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Splits a comma-separated list, dropping blanks.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_drops_blanks() {
        let list = parse_list(" http://a.test, ,http://b.test ,");
        assert_eq!(list, vec!["http://a.test", "http://b.test"]);
    }

    #[test]
    fn parse_list_empty() {
        assert!(parse_list("").is_empty());
    }
}
