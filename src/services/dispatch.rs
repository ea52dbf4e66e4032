// src/services/dispatch.rs

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::{config::Config, error::AppError};

#[derive(Debug, Clone, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub link: Option<String>,
}

/// Outbound delivery of emails and push notifications.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn send_email(&self, message: EmailMessage) -> Result<(), AppError>;
    async fn send_push(&self, message: PushMessage) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct MailApiRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
}

/// Posts JSON to a mail API and, optionally, a push API.
pub struct HttpDispatcher {
    client: reqwest::Client,
    mail_url: String,
    mail_key: Option<String>,
    mail_from: String,
    push_url: Option<String>,
}

impl HttpDispatcher {
    pub fn new(
        mail_url: String,
        mail_key: Option<String>,
        mail_from: String,
        push_url: Option<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            mail_url,
            mail_key,
            mail_from,
            push_url,
        }
    }

    async fn post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
        bearer: Option<&str>,
    ) -> Result<(), AppError> {
        let mut request = self.client.post(url).json(body);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| AppError::InternalServerError(format!("dispatch to {url} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::error!("Dispatch API error: {status} - {text}");
            return Err(AppError::InternalServerError(format!(
                "dispatch API returned {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Dispatcher for HttpDispatcher {
    async fn send_email(&self, message: EmailMessage) -> Result<(), AppError> {
        let body = MailApiRequest {
            from: &self.mail_from,
            to: vec![message.to.as_str()],
            subject: &message.subject,
            text: &message.body,
        };
        self.post(&self.mail_url, &body, self.mail_key.as_deref())
            .await?;
        tracing::info!("email sent to {}", message.to);
        Ok(())
    }

    async fn send_push(&self, message: PushMessage) -> Result<(), AppError> {
        match &self.push_url {
            Some(url) => {
                self.post(url, &message, None).await?;
                tracing::debug!("push sent to user {}", message.user_id);
            }
            None => tracing::debug!(
                "no push endpoint configured, dropping push for user {}",
                message.user_id
            ),
        }
        Ok(())
    }
}

/// Logs instead of delivering. Used when no mail endpoint is configured.
pub struct LogDispatcher;

#[async_trait]
impl Dispatcher for LogDispatcher {
    async fn send_email(&self, message: EmailMessage) -> Result<(), AppError> {
        tracing::info!(to = %message.to, subject = %message.subject, "email (not delivered)");
        Ok(())
    }

    async fn send_push(&self, message: PushMessage) -> Result<(), AppError> {
        tracing::info!(user_id = message.user_id, title = %message.title, "push (not delivered)");
        Ok(())
    }
}

/// Picks the HTTP dispatcher when `MAIL_API_URL` is set.
pub fn from_config(config: &Config) -> Arc<dyn Dispatcher> {
    match &config.mail_api_url {
        Some(url) => Arc::new(HttpDispatcher::new(
            url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
            config.push_api_url.clone(),
        )),
        None => Arc::new(LogDispatcher),
    }
}

/// Spawns the email; failures are logged and dropped.
pub fn email_fire_and_forget(dispatcher: &Arc<dyn Dispatcher>, message: EmailMessage) {
    let dispatcher = Arc::clone(dispatcher);
    tokio::spawn(async move {
        let to = message.to.clone();
        if let Err(e) = dispatcher.send_email(message).await {
            tracing::warn!("Failed to send email to {}: {:?}", to, e);
        }
    });
}

/// Spawns the push; failures are logged and dropped.
pub fn push_fire_and_forget(dispatcher: &Arc<dyn Dispatcher>, message: PushMessage) {
    let dispatcher = Arc::clone(dispatcher);
    tokio::spawn(async move {
        let user_id = message.user_id;
        if let Err(e) = dispatcher.send_push(message).await {
            tracing::warn!("Failed to push to user {}: {:?}", user_id, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recording {
        emails: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Dispatcher for Recording {
        async fn send_email(&self, message: EmailMessage) -> Result<(), AppError> {
            self.emails.lock().unwrap().push(message.to);
            Ok(())
        }

        async fn send_push(&self, _message: PushMessage) -> Result<(), AppError> {
            Err(AppError::InternalServerError("push down".into()))
        }
    }

    #[tokio::test]
    async fn fire_and_forget_delivers_and_swallows_errors() {
        let recording = Arc::new(Recording {
            emails: Mutex::new(Vec::new()),
        });
        let dispatcher: Arc<dyn Dispatcher> = recording.clone();

        email_fire_and_forget(
            &dispatcher,
            EmailMessage {
                to: "a@example.com".into(),
                subject: "s".into(),
                body: "b".into(),
            },
        );
        push_fire_and_forget(
            &dispatcher,
            PushMessage {
                user_id: 1,
                title: "t".into(),
                body: "b".into(),
                link: None,
            },
        );

        for _ in 0..50 {
            if !recording.emails.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(*recording.emails.lock().unwrap(), vec!["a@example.com"]);
    }

    #[tokio::test]
    async fn log_dispatcher_never_fails() {
        let d = LogDispatcher;
        assert!(
            d.send_email(EmailMessage {
                to: "x@example.com".into(),
                subject: "s".into(),
                body: "b".into(),
            })
            .await
            .is_ok()
        );
    }
}
