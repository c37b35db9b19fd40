use serde::{Deserialize, Serialize};
use uuid::Uuid;

use reskill_core::{EmailAddress, TenantId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for MessageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A rendered message waiting in the outbox.
///
/// Bodies may contain bearer links, so `Debug` leaves them out.
#[derive(Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub id: MessageId,
    pub tenant_id: TenantId,
    pub to: EmailAddress,
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl core::fmt::Debug for MailMessage {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MailMessage")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("to", &self.to)
            .field("subject", &self.subject)
            .finish_non_exhaustive()
    }
}
