//! Companies, the tenants of the platform.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use reskill_core::TenantId;

use crate::error::RepositoryError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: TenantId,
    pub name: String,
}

/// Directory of known companies, ordered by id.
#[derive(Debug, Default)]
pub struct CompanyDirectory {
    companies: RwLock<BTreeMap<TenantId, Company>>,
}

impl CompanyDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: TenantId, name: impl Into<String>) -> Result<Company, RepositoryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(reskill_core::DomainError::validation("company name is required").into());
        }
        let mut companies = self.companies.write().map_err(|_| RepositoryError::poisoned())?;
        if companies.contains_key(&id) {
            return Err(RepositoryError::Conflict(format!("company {id} already exists")));
        }
        let company = Company { id, name };
        companies.insert(id, company.clone());
        Ok(company)
    }

    /// Register a company under the next free id.
    pub fn create(&self, name: impl Into<String>) -> Result<Company, RepositoryError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(reskill_core::DomainError::validation("company name is required").into());
        }
        let mut companies = self.companies.write().map_err(|_| RepositoryError::poisoned())?;
        let id = TenantId::new(companies.keys().next_back().map_or(1, |id| id.get() + 1));
        let company = Company { id, name };
        companies.insert(id, company.clone());
        Ok(company)
    }

    pub fn get(&self, id: TenantId) -> Result<Option<Company>, RepositoryError> {
        let companies = self.companies.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(companies.get(&id).cloned())
    }

    pub fn list(&self) -> Result<Vec<Company>, RepositoryError> {
        let companies = self.companies.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(companies.values().cloned().collect())
    }
}
