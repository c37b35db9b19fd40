//! Campaigns and their invitations.
//!
//! Every campaign belongs to exactly one tenant, taken from the caller's
//! context and never from client input. Invitations are reachable by
//! tenant + id, or globally by their bearer token for the public landing.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};

use reskill_core::{CampaignId, DomainError, EmailAddress, InvitationId, TenantId};

use crate::error::RepositoryError;
use crate::store::{InMemoryTenantStore, TenantStore};
use crate::tenancy::Company;

const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const CODE_LEN: usize = 8;
const TOKEN_LEN: usize = 64;
const MAX_CODE_ATTEMPTS: usize = 32;

/// Random uppercase alphanumeric campaign code.
pub fn generate_campaign_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub tenant_id: TenantId,
    pub name: String,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

/// Input for [`CampaignRepository::create_campaign`]. Carries no tenant.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCampaign {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// A campaign together with its owning company.
///
/// The company is optional so that renderers can detect an unloaded
/// relation instead of guessing a name.
#[derive(Debug, Clone, Copy)]
pub struct CampaignView<'a> {
    pub campaign: &'a Campaign,
    pub company: Option<&'a Company>,
}

/// Bearer secret that identifies an invitation in its public URL.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvitationToken(String);

impl InvitationToken {
    pub fn generate() -> Self {
        let token = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_LEN)
            .map(char::from)
            .collect();
        Self(token)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for InvitationToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("InvitationToken(<redacted>)")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Created,
    /// Queued for delivery.
    Emailed,
    Consumed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignInvitation {
    pub id: InvitationId,
    pub tenant_id: TenantId,
    pub campaign_id: CampaignId,
    pub email: EmailAddress,
    pub token: InvitationToken,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
}

impl CampaignInvitation {
    pub fn mark_emailed(&mut self) -> Result<(), DomainError> {
        match self.status {
            InvitationStatus::Created => {
                self.status = InvitationStatus::Emailed;
                Ok(())
            }
            InvitationStatus::Emailed => Ok(()),
            InvitationStatus::Consumed => {
                Err(DomainError::invariant("invitation already consumed"))
            }
        }
    }

    pub fn mark_consumed(&mut self) -> Result<(), DomainError> {
        if self.status == InvitationStatus::Consumed {
            return Err(DomainError::invariant("invitation already consumed"));
        }
        self.status = InvitationStatus::Consumed;
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.status != InvitationStatus::Consumed
    }
}

/// In-memory campaign and invitation repository.
#[derive(Debug, Default)]
pub struct CampaignRepository {
    campaigns: InMemoryTenantStore<CampaignId, Campaign>,
    invitations: InMemoryTenantStore<InvitationId, CampaignInvitation>,
    codes: RwLock<HashSet<(TenantId, String)>>,
    tokens: RwLock<HashMap<String, (TenantId, InvitationId)>>,
}

impl CampaignRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a campaign for `tenant_id`.
    ///
    /// A supplied code is kept verbatim; a blank one counts as absent and a
    /// fresh code unique within the tenant is generated.
    pub fn create_campaign(
        &self,
        tenant_id: TenantId,
        input: NewCampaign,
    ) -> Result<Campaign, RepositoryError> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("campaign name is required").into());
        }

        let supplied = input.code.filter(|c| !c.trim().is_empty());

        let code = {
            let mut codes = self.codes.write().map_err(|_| RepositoryError::poisoned())?;
            let code = match supplied {
                Some(code) if codes.contains(&(tenant_id, code.clone())) => {
                    return Err(RepositoryError::Conflict(format!(
                        "campaign code {code} is taken"
                    )));
                }
                Some(code) => code,
                None => (0..MAX_CODE_ATTEMPTS)
                    .map(|_| generate_campaign_code())
                    .find(|c| !codes.contains(&(tenant_id, c.clone())))
                    .ok_or_else(|| {
                        RepositoryError::Conflict("could not generate a unique code".into())
                    })?,
            };
            codes.insert((tenant_id, code.clone()));
            code
        };

        let campaign = Campaign {
            id: CampaignId::new(),
            tenant_id,
            name: name.to_string(),
            code,
            created_at: Utc::now(),
        };
        self.campaigns
            .upsert(tenant_id, campaign.id, campaign.clone())?;
        Ok(campaign)
    }

    pub fn get_campaign(
        &self,
        tenant_id: TenantId,
        id: CampaignId,
    ) -> Result<Option<Campaign>, RepositoryError> {
        self.campaigns.get(tenant_id, &id)
    }

    /// Campaigns of one tenant, oldest first.
    pub fn list_campaigns(&self, tenant_id: TenantId) -> Result<Vec<Campaign>, RepositoryError> {
        let mut campaigns = self.campaigns.list(tenant_id)?;
        campaigns.sort_by_key(|c| (c.created_at, *c.id.as_uuid()));
        Ok(campaigns)
    }

    pub fn count_campaigns(&self, tenant_id: TenantId) -> Result<usize, RepositoryError> {
        self.campaigns.count(tenant_id)
    }

    /// Invite `email` to a campaign of `tenant_id`.
    ///
    /// A campaign of another tenant is reported as not found.
    pub fn create_invitation(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
        email: EmailAddress,
    ) -> Result<CampaignInvitation, RepositoryError> {
        if self.campaigns.get(tenant_id, &campaign_id)?.is_none() {
            return Err(RepositoryError::NotFound("campaign"));
        }

        let invitation = CampaignInvitation {
            id: InvitationId::new(),
            tenant_id,
            campaign_id,
            email,
            token: InvitationToken::generate(),
            status: InvitationStatus::Created,
            created_at: Utc::now(),
        };

        {
            let mut tokens = self.tokens.write().map_err(|_| RepositoryError::poisoned())?;
            if tokens.contains_key(invitation.token.expose()) {
                return Err(RepositoryError::Conflict("invitation token collision".into()));
            }
            tokens.insert(
                invitation.token.expose().to_string(),
                (tenant_id, invitation.id),
            );
        }
        self.invitations
            .upsert(tenant_id, invitation.id, invitation.clone())?;
        Ok(invitation)
    }

    pub fn get_invitation(
        &self,
        tenant_id: TenantId,
        id: InvitationId,
    ) -> Result<Option<CampaignInvitation>, RepositoryError> {
        self.invitations.get(tenant_id, &id)
    }

    pub fn list_invitations(
        &self,
        tenant_id: TenantId,
        campaign_id: CampaignId,
    ) -> Result<Vec<CampaignInvitation>, RepositoryError> {
        let mut invitations: Vec<_> = self
            .invitations
            .list(tenant_id)?
            .into_iter()
            .filter(|i| i.campaign_id == campaign_id)
            .collect();
        invitations.sort_by_key(|i| i.created_at);
        Ok(invitations)
    }

    /// Resolve a bearer token. Consumed invitations are still returned;
    /// callers decide whether they are usable.
    pub fn find_invitation_by_token(
        &self,
        token: &str,
    ) -> Result<Option<CampaignInvitation>, RepositoryError> {
        let key = {
            let tokens = self.tokens.read().map_err(|_| RepositoryError::poisoned())?;
            tokens.get(token).copied()
        };
        match key {
            Some((tenant_id, id)) => self.invitations.get(tenant_id, &id),
            None => Ok(None),
        }
    }

    /// Remove an invitation that was never delivered, together with its
    /// token. Delivered invitations are left alone.
    pub fn discard_invitation(
        &self,
        tenant_id: TenantId,
        id: InvitationId,
    ) -> Result<Option<CampaignInvitation>, RepositoryError> {
        match self.invitations.get(tenant_id, &id)? {
            Some(invitation) if invitation.status == InvitationStatus::Created => {
                self.tokens
                    .write()
                    .map_err(|_| RepositoryError::poisoned())?
                    .remove(invitation.token.expose());
                self.invitations.remove(tenant_id, &id)
            }
            _ => Ok(None),
        }
    }

    pub fn mark_invitation_emailed(
        &self,
        tenant_id: TenantId,
        id: InvitationId,
    ) -> Result<CampaignInvitation, RepositoryError> {
        self.transition(tenant_id, id, CampaignInvitation::mark_emailed)
    }

    pub fn mark_invitation_consumed(
        &self,
        tenant_id: TenantId,
        id: InvitationId,
    ) -> Result<CampaignInvitation, RepositoryError> {
        self.transition(tenant_id, id, CampaignInvitation::mark_consumed)
    }

    fn transition(
        &self,
        tenant_id: TenantId,
        id: InvitationId,
        step: fn(&mut CampaignInvitation) -> Result<(), DomainError>,
    ) -> Result<CampaignInvitation, RepositoryError> {
        let mut invitation = self
            .invitations
            .get(tenant_id, &id)?
            .ok_or(RepositoryError::NotFound("invitation"))?;
        step(&mut invitation)?;
        self.invitations
            .upsert(tenant_id, id, invitation.clone())?;
        Ok(invitation)
    }
}
