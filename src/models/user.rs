// src/models/user.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Account role. Stored as lowercase text in `users.role` and `profiles.role`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Trainee,
    Employee,
    Trainer,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Trainee => "trainee",
            Role::Employee => "employee",
            Role::Trainer => "trainer",
            Role::Admin => "admin",
        }
    }

    /// Trainees and employees are the learner roles.
    pub fn is_learner(&self) -> bool {
        matches!(self, Role::Trainee | Role::Employee)
    }

    /// Front-end dashboard path returned at login.
    pub fn dashboard_url(&self, username: &str) -> String {
        format!("/{}-dashboard/{}", self.as_str(), username)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trainee" => Ok(Role::Trainee),
            "employee" => Ok(Role::Employee),
            "trainer" => Ok(Role::Trainer),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Invalid role: {}", other)),
        }
    }
}

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    pub email: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// One of 'trainee', 'employee', 'trainer', 'admin'.
    pub role: String,

    /// Accounts start inactive and are activated by an admin.
    pub is_active: bool,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Represents the 'profiles' table: one row per user, whatever the role.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: i64,
    pub role: String,
    pub name: String,
    pub employee_id: String,
    pub department: String,
    pub designation: String,
    /// Trainer assigned to a trainee.
    pub trainer_id: Option<i64>,
    /// Topics a trainer covers.
    pub expertise: String,
}

/// User joined with profile fields, used by admin listings.
#[derive(Debug, Serialize, FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub name: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for registration. The account is created inactive.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(
        min = 3,
        max = 150,
        message = "Username length must be between 3 and 150 characters."
    ))]
    pub username: String,
    #[validate(email(message = "A valid email address is required."))]
    pub email: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    pub role: Role,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub name: String,
    #[validate(length(max = 20))]
    #[serde(default)]
    pub employee_id: String,
    #[validate(length(min = 1, max = 100, message = "Department is required."))]
    pub department: String,
    #[validate(length(max = 100))]
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub expertise: Option<String>,
    /// Only meaningful for trainees.
    #[serde(default)]
    pub trainer_id: Option<i64>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 150))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}
