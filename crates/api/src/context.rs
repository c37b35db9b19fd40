use reskill_auth::{AdminIdentity, CompanyIdentity};
use reskill_core::TenantId;

/// Tenant context for a request.
///
/// Populated once by the tenant fence; every company route can rely on it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TenantContext {
    tenant_id: TenantId,
}

impl TenantContext {
    pub fn new(tenant_id: TenantId) -> Self {
        Self { tenant_id }
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }
}

/// Authenticated administrator for a request.
#[derive(Debug, Clone)]
pub struct AdminContext {
    identity: AdminIdentity,
}

impl AdminContext {
    pub fn new(identity: AdminIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &AdminIdentity {
        &self.identity
    }
}

/// Authenticated company user for a request.
#[derive(Debug, Clone)]
pub struct CompanyContext {
    identity: CompanyIdentity,
}

impl CompanyContext {
    pub fn new(identity: CompanyIdentity) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &CompanyIdentity {
        &self.identity
    }
}
