//! Email address value object.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A syntactically well-formed, normalized email address.
///
/// Normalization trims surrounding whitespace and lowercases the whole
/// address, so lookups by email are case-insensitive within a realm.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let candidate = raw.trim().to_lowercase();
        if candidate.len() > 254 {
            return Err(DomainError::validation("email is too long"));
        }

        let Some((local, domain)) = candidate.split_once('@') else {
            return Err(DomainError::validation("email must contain '@'"));
        };

        let well_formed = !local.is_empty()
            && !domain.is_empty()
            && !domain.contains('@')
            && domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !candidate.chars().any(char::is_whitespace);

        if !well_formed {
            return Err(DomainError::validation("email is not well-formed"));
        }

        Ok(Self(candidate))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}
