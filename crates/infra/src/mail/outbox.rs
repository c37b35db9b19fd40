use std::collections::HashMap;
use std::sync::RwLock;

use reskill_core::TenantId;

use super::MailError;
use super::message::{MailMessage, MessageId};

/// Rendered messages awaiting delivery, keyed by id.
#[derive(Debug, Default)]
pub struct MailOutbox {
    messages: RwLock<HashMap<MessageId, MailMessage>>,
}

fn poisoned<T>(_: T) -> MailError {
    MailError::Outbox("outbox lock poisoned".to_string())
}

impl MailOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, message: MailMessage) -> Result<MessageId, MailError> {
        let id = message.id;
        self.messages.write().map_err(poisoned)?.insert(id, message);
        Ok(id)
    }

    /// Look a message up within its tenant.
    pub fn get(&self, tenant_id: TenantId, id: MessageId) -> Result<Option<MailMessage>, MailError> {
        let messages = self.messages.read().map_err(poisoned)?;
        Ok(messages
            .get(&id)
            .filter(|m| m.tenant_id == tenant_id)
            .cloned())
    }

    /// Drop a delivered message.
    pub fn remove(&self, id: MessageId) -> Result<(), MailError> {
        self.messages.write().map_err(poisoned)?.remove(&id);
        Ok(())
    }

    pub fn len(&self) -> Result<usize, MailError> {
        Ok(self.messages.read().map_err(poisoned)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, MailError> {
        self.len().map(|n| n == 0)
    }
}
