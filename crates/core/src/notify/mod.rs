pub mod html;
pub mod smtp;

use crate::clock::Clock;
use crate::domain::report::{DeliveryRecord, DeliveryStatus, Report};
use crate::error::StageError;
use crate::research::RetryPolicy;
use chrono::Utc;
use std::fmt;
use std::sync::Arc;

/// Gmail account used both to authenticate and as the sender address.
#[derive(Clone, PartialEq, Eq)]
pub struct GmailCredentials {
    pub user: String,
    app_password: String,
}

impl GmailCredentials {
    /// App passwords are shown grouped with spaces; the spaces are not part of the secret.
    pub fn new(user: impl Into<String>, app_password: &str) -> Self {
        Self {
            user: user.into().trim().to_string(),
            app_password: app_password.chars().filter(|c| !c.is_whitespace()).collect(),
        }
    }

    pub fn app_password(&self) -> &str {
        &self.app_password
    }
}

impl fmt::Debug for GmailCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GmailCredentials")
            .field("user", &self.user)
            .field("app_password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: String,
}

/// Transport seam for one send attempt. Errors come back classified.
#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn deliver(
        &self,
        email: &OutgoingEmail,
        credentials: &GmailCredentials,
    ) -> Result<(), StageError>;
}

pub struct NotificationDispatcher {
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl NotificationDispatcher {
    pub fn new(mailer: Arc<dyn Mailer>, clock: Arc<dyn Clock>) -> Self {
        Self {
            mailer,
            clock,
            policy: RetryPolicy::delivery(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sends the report to a single recipient. Never fails: the outcome is the record.
    pub async fn send(
        &self,
        report: &Report,
        recipient: &str,
        credentials: &GmailCredentials,
    ) -> DeliveryRecord {
        let run_id = report.run_id();
        let email = OutgoingEmail {
            from: credentials.user.clone(),
            to: recipient.to_string(),
            subject: html::subject(report),
            html_body: html::render_email_html(report),
            text_body: report.rendered_markdown().to_string(),
        };

        let mailer = &self.mailer;
        let email_ref = &email;
        let (res, attempts) = self
            .policy
            .run(self.clock.as_ref(), "smtp", move |_| async move {
                mailer.deliver(email_ref, credentials).await
            })
            .await;

        let delivered_at = self.clock.now().with_timezone(&Utc);
        match res {
            Ok(()) => {
                tracing::info!(%run_id, recipient, attempts, "report emailed");
                DeliveryRecord {
                    run_id,
                    delivered_at,
                    status: DeliveryStatus::Sent,
                    recipient: recipient.to_string(),
                    attempts,
                    error_kind: None,
                    error: None,
                }
            }
            Err(err) => {
                tracing::error!(%run_id, recipient, attempts, error = %err, "report email failed");
                DeliveryRecord {
                    run_id,
                    delivered_at,
                    status: DeliveryStatus::Failed,
                    recipient: recipient.to_string(),
                    attempts,
                    error_kind: Some(err.kind),
                    error: Some(err.detail),
                }
            }
        }
    }
}
