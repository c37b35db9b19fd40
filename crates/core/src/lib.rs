//! `reskill-core`: shared domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod email;
pub mod error;
pub mod id;

pub use email::EmailAddress;
pub use error::DomainError;
pub use id::{CampaignId, IdentityId, InvitationId, ResponseId, TenantId};
