use crate::config::Settings;
use crate::error::{ErrorKind, StageError};
use crate::notify::{GmailCredentials, Mailer, OutgoingEmail};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

const DEFAULT_HOST: &str = "smtp.gmail.com";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const SENDER_NAME: &str = "주식 리서치";

const STAGE: &str = "smtp";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpOptions {
    pub host: String,
    pub timeout: Duration,
}

impl Default for SmtpOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SmtpOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();
        Self {
            host: settings.smtp_host.clone().unwrap_or(defaults.host),
            timeout: settings
                .smtp_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

/// Implicit-TLS SMTP submission (port 465) authenticated with a Gmail app password.
#[derive(Debug, Clone)]
pub struct SmtpMailer {
    options: SmtpOptions,
}

impl SmtpMailer {
    pub fn new(options: SmtpOptions) -> Self {
        Self { options }
    }

    fn build_message(email: &OutgoingEmail) -> Result<Message, StageError> {
        let sender: Address = email
            .from
            .parse()
            .map_err(|err| StageError::config_missing(format!("invalid sender address: {err}")))?;
        let from = Mailbox::new(Some(SENDER_NAME.to_string()), sender);
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|err| StageError::config_missing(format!("invalid recipient address: {err}")))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(email.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                email.text_body.clone(),
                email.html_body.clone(),
            ))
            .map_err(|err| {
                StageError::new(ErrorKind::Delivery, STAGE, format!("failed to build message: {err}"))
            })
    }
}

#[async_trait::async_trait]
impl Mailer for SmtpMailer {
    async fn deliver(
        &self,
        email: &OutgoingEmail,
        credentials: &GmailCredentials,
    ) -> Result<(), StageError> {
        let message = Self::build_message(email)?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.options.host)
            .map_err(|err| {
                StageError::new(ErrorKind::Delivery, STAGE, format!("invalid SMTP relay: {err}"))
            })?
            .credentials(Credentials::new(
                credentials.user.clone(),
                credentials.app_password().to_string(),
            ))
            .timeout(Some(self.options.timeout))
            .build();

        transport
            .send(message)
            .await
            .map(|_| ())
            .map_err(classify_smtp_error)
    }
}

fn classify_smtp_error(err: lettre::transport::smtp::Error) -> StageError {
    // 530/534/535: authentication required, rejected, or app password not accepted.
    let code = err.status().map(|c| c.to_string());
    let is_auth = code
        .as_deref()
        .is_some_and(|c| matches!(c, "530" | "534" | "535"));

    let kind = if is_auth {
        ErrorKind::Auth
    } else {
        ErrorKind::Delivery
    };
    StageError::new(kind, STAGE, err.to_string())
}
