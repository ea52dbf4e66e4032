// src/models/report.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Learner category a report or notification targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
    Trainee,
    Employee,
}

impl Audience {
    pub const ALL: [Audience; 2] = [Audience::Trainee, Audience::Employee];

    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Trainee => "trainee",
            Audience::Employee => "employee",
        }
    }
}

impl fmt::Display for Audience {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Audience {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trainee" => Ok(Audience::Trainee),
            "employee" => Ok(Audience::Employee),
            other => Err(format!("Invalid audience: {}", other)),
        }
    }
}

/// Represents the 'assessment_reports' table: a cached rollup per (quiz, audience).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AssessmentReport {
    pub id: i64,
    pub quiz_id: i64,
    pub audience: String,
    pub report_type: String,
    pub total_population: i32,
    pub attempted: i32,
    pub average_score: f64,
    pub completion_rate: f64,
    pub last_updated: chrono::DateTime<chrono::Utc>,
}

/// One attempt listed under a report.
#[derive(Debug, Serialize, FromRow)]
pub struct AttemptRecord {
    pub result_id: i64,
    pub user_id: i64,
    pub username: String,
    pub role: String,
    pub display_name: Option<String>,
    pub department: Option<String>,
    pub designation: Option<String>,
    pub score: f64,
    pub date_attempted: chrono::DateTime<chrono::Utc>,
}

/// A report with its quiz name and the attempts behind it.
#[derive(Debug, Serialize)]
pub struct ReportWithResults {
    #[serde(flatten)]
    pub report: AssessmentReport,
    pub quiz_name: String,
    pub department: String,
    pub results: Vec<AttemptRecord>,
}

/// Query parameters of the trainer report endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub quiz_id: Option<i64>,
    pub audience: Option<String>,
    pub refresh: Option<String>,
    pub autocreate: Option<String>,
}

/// Interprets '1', 'true', 'yes', 'on' as true.
pub fn truthy(value: Option<&str>) -> bool {
    matches!(
        value.map(|v| v.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

impl ReportParams {
    /// Audience filter. Unknown values are ignored rather than rejected.
    pub fn audience(&self) -> Option<Audience> {
        self.audience.as_deref().and_then(|a| a.parse().ok())
    }

    /// A flag defaults to `default` when absent.
    fn flag(value: Option<&str>, default: bool) -> bool {
        match value {
            None => default,
            Some(v) => truthy(Some(v)),
        }
    }

    /// Autocreate defaults on when a quiz id is given.
    pub fn autocreate(&self) -> bool {
        Self::flag(self.autocreate.as_deref(), self.quiz_id.is_some())
    }

    /// Refresh defaults on when a quiz id is given.
    pub fn refresh(&self) -> bool {
        Self::flag(self.refresh.as_deref(), self.quiz_id.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthy_values() {
        for v in ["1", "true", "YES", " on "] {
            assert!(truthy(Some(v)), "{v}");
        }
        for v in ["0", "false", "", "nope"] {
            assert!(!truthy(Some(v)), "{v}");
        }
        assert!(!truthy(None));
    }

    #[test]
    fn flags_default_on_in_quiz_mode() {
        let params = ReportParams {
            quiz_id: Some(3),
            ..Default::default()
        };
        assert!(params.autocreate());
        assert!(params.refresh());

        let params = ReportParams {
            quiz_id: Some(3),
            refresh: Some("false".into()),
            ..Default::default()
        };
        assert!(!params.refresh());
    }

    #[test]
    fn flags_default_off_in_list_mode() {
        let params = ReportParams::default();
        assert!(!params.autocreate());
        assert!(!params.refresh());
    }

    #[test]
    fn unknown_audience_is_ignored() {
        let params = ReportParams {
            audience: Some("trainer".into()),
            ..Default::default()
        };
        assert_eq!(params.audience(), None);
    }
}
