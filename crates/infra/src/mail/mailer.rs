use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::info;

use super::MailError;
use super::message::MailMessage;

/// Delivery transport.
pub trait Mailer: Send + Sync {
    fn deliver(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// SMTP connection settings.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
}

impl core::fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("from_address", &self.from_address)
            .field("from_name", &self.from_name)
            .finish()
    }
}

/// Sends through an SMTP relay (STARTTLS/TLS via rustls).
pub struct SmtpMailer {
    from: Mailbox,
    transport: SmtpTransport,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = format!("{} <{}>", config.from_name, config.from_address)
            .parse()
            .map_err(|e| MailError::Address(format!("from address: {e}")))?;

        let builder = SmtpTransport::relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port);

        let transport = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => builder
                .credentials(Credentials::new(user.clone(), pass.clone()))
                .build(),
            (None, None) => builder.build(),
            _ => {
                return Err(MailError::MissingConfig(
                    "MAIL_USERNAME and MAIL_PASSWORD must be set together",
                ));
            }
        };

        Ok(Self { from, transport })
    }
}

impl Mailer for SmtpMailer {
    fn deliver(&self, message: &MailMessage) -> Result<(), MailError> {
        let to: Mailbox = message
            .to
            .as_str()
            .parse()
            .map_err(|e| MailError::Address(format!("recipient: {e}")))?;

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(message.subject.clone())
            .multipart(MultiPart::alternative_plain_html(
                message.text.clone(),
                message.html.clone(),
            ))
            .map_err(|e| MailError::Transport(format!("build message: {e}")))?;

        self.transport
            .send(&email)
            .map_err(|e| MailError::Transport(e.to_string()))?;

        info!(message_id = %message.id, subject = %message.subject, "mail delivered");
        Ok(())
    }
}

/// Logs recipient and subject instead of sending. Used when no SMTP relay
/// is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn deliver(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            message_id = %message.id,
            to = %message.to,
            subject = %message.subject,
            "mail logged (not sent)"
        );
        Ok(())
    }
}
