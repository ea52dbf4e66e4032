// src/services/certificate.rs

use std::path::PathBuf;

use async_trait::async_trait;

use crate::{error::AppError, utils::slug::slugify};

/// Everything printed on a certificate.
#[derive(Debug, Clone)]
pub struct CertificateInput {
    pub user_id: i64,
    pub quiz_id: i64,
    pub result_id: i64,
    pub username: String,
    pub learner_name: String,
    pub department: String,
    pub quiz_name: String,
    pub topic: String,
    pub score: f64,
    pub passed: bool,
    pub date_attempted: chrono::DateTime<chrono::Utc>,
}

impl CertificateInput {
    pub fn title(&self) -> &'static str {
        if self.passed {
            "Certificate of Excellence"
        } else {
            "Certificate of Completion"
        }
    }

    /// Unique per result. The quiz slug only makes the name readable.
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}_certificate.txt",
            self.user_id,
            self.quiz_id,
            self.result_id,
            slugify(&self.quiz_name)
        )
    }

    pub fn render_text(&self) -> String {
        let name = if self.learner_name.trim().is_empty() {
            &self.username
        } else {
            &self.learner_name
        };
        format!(
            "{title}\n\n\
             This certifies that {name} ({department})\n\
             completed \"{quiz}\" on the topic of {topic}\n\
             with a score of {score:.2}% on {date}.\n",
            title = self.title(),
            name = name,
            department = self.department,
            quiz = self.quiz_name,
            topic = self.topic,
            score = self.score,
            date = self.date_attempted.format("%Y-%m-%d"),
        )
    }
}

/// Produces a certificate artifact and returns its path relative to the media root.
#[async_trait]
pub trait CertificateRenderer: Send + Sync {
    async fn render(&self, input: &CertificateInput) -> Result<String, AppError>;
}

/// Writes plain-text certificates under `<media_root>/certificates/`.
pub struct FileCertificateRenderer {
    media_root: PathBuf,
}

impl FileCertificateRenderer {
    pub fn new(media_root: impl Into<PathBuf>) -> Self {
        Self {
            media_root: media_root.into(),
        }
    }
}

#[async_trait]
impl CertificateRenderer for FileCertificateRenderer {
    async fn render(&self, input: &CertificateInput) -> Result<String, AppError> {
        let dir = self.media_root.join("certificates");
        tokio::fs::create_dir_all(&dir).await.map_err(|e| {
            tracing::error!("Failed to create certificate dir {:?}: {:?}", dir, e);
            AppError::InternalServerError(e.to_string())
        })?;

        let file_name = input.file_name();
        tokio::fs::write(dir.join(&file_name), input.render_text())
            .await
            .map_err(|e| {
                tracing::error!("Failed to write certificate {}: {:?}", file_name, e);
                AppError::InternalServerError(e.to_string())
            })?;

        Ok(format!("certificates/{}", file_name))
    }
}

/// Public URL of a stored certificate path.
pub fn certificate_url(path: &str) -> String {
    format!("/media/{}", path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(passed: bool) -> CertificateInput {
        CertificateInput {
            user_id: 7,
            quiz_id: 3,
            result_id: 11,
            username: "amy".into(),
            learner_name: "Amy Pond".into(),
            department: "IT".into(),
            quiz_name: "Rust Basics".into(),
            topic: "Ownership".into(),
            score: 75.0,
            passed,
            date_attempted: chrono::Utc::now(),
        }
    }

    #[test]
    fn title_depends_on_pass() {
        assert_eq!(input(true).title(), "Certificate of Excellence");
        assert_eq!(input(false).title(), "Certificate of Completion");
    }

    #[test]
    fn text_mentions_learner_and_score() {
        let text = input(true).render_text();
        assert!(text.contains("Amy Pond (IT)"));
        assert!(text.contains("75.00%"));
        assert!(text.contains("Ownership"));
    }

    #[test]
    fn file_name_is_keyed_on_ids() {
        assert_eq!(input(true).file_name(), "7_3_11_rust-basics_certificate.txt");
    }

    #[tokio::test]
    async fn file_renderer_writes_under_media_root() {
        let root = std::env::temp_dir().join(format!("lms-cert-{}", std::process::id()));
        let renderer = FileCertificateRenderer::new(&root);

        let path = renderer.render(&input(false)).await.unwrap();

        assert_eq!(path, "certificates/7_3_11_rust-basics_certificate.txt");
        let written = tokio::fs::read_to_string(root.join(&path)).await.unwrap();
        assert!(written.starts_with("Certificate of Completion"));
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn same_names_do_not_share_a_file() {
        let root = std::env::temp_dir().join(format!("lms-cert-names-{}", std::process::id()));
        let renderer = FileCertificateRenderer::new(&root);

        let mut first = input(true);
        first.quiz_name = "Weekly Quiz".into();
        first.score = 90.0;
        let mut second = first.clone();
        second.quiz_id = 4;
        second.result_id = 12;
        second.score = 10.0;
        second.passed = false;

        // "a.b" and "a_b" slug to the same text
        let mut third = first.clone();
        third.user_id = 8;
        third.result_id = 13;
        third.username = "a_b".into();
        third.learner_name = "Bob".into();
        first.username = "a.b".into();

        let first_path = renderer.render(&first).await.unwrap();
        let second_path = renderer.render(&second).await.unwrap();
        let third_path = renderer.render(&third).await.unwrap();

        assert_ne!(first_path, second_path);
        assert_ne!(first_path, third_path);

        let first_text = tokio::fs::read_to_string(root.join(&first_path)).await.unwrap();
        assert!(first_text.starts_with("Certificate of Excellence"));
        assert!(first_text.contains("Amy Pond"));
        assert!(first_text.contains("90.00%"));

        let second_text = tokio::fs::read_to_string(root.join(&second_path)).await.unwrap();
        assert!(second_text.starts_with("Certificate of Completion"));
        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[test]
    fn url_is_under_media() {
        assert_eq!(certificate_url("certificates/a.txt"), "/media/certificates/a.txt");
    }
}
