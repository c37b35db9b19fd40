//! Outgoing mail: invitation rendering, the outbox and delivery transports.
//!
//! Sending is queued. [`InvitationMailer::send`] renders a message into the
//! outbox and enqueues a `mail.campaign_invitation` job; the job handler
//! hands the message to a [`Mailer`].

pub mod invitation;
pub mod mailer;
pub mod message;
pub mod outbox;

use thiserror::Error;

pub use invitation::{InvitationMailer, MailDelivery};
pub use mailer::{LogMailer, Mailer, SmtpConfig, SmtpMailer};
pub use message::{MailMessage, MessageId};
pub use outbox::MailOutbox;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    /// A relation needed for rendering was not loaded.
    #[error("missing relation: {0}")]
    MissingRelation(&'static str),

    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    #[error("invalid address: {0}")]
    Address(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not queue mail: {0}")]
    Enqueue(String),

    #[error("outbox error: {0}")]
    Outbox(String),
}
