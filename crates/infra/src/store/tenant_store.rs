use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, RwLock};

use reskill_core::TenantId;

use crate::error::RepositoryError;

/// Tenant-isolated key/value store.
///
/// Every operation takes the tenant explicitly; there is no way to read a
/// record without naming the tenant it belongs to.
pub trait TenantStore<K, V>: Send + Sync {
    fn get(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, RepositoryError>;
    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), RepositoryError>;
    /// Drop a record, returning it if it existed.
    fn remove(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, RepositoryError>;
    /// Values for one tenant, in no particular order.
    fn list(&self, tenant_id: TenantId) -> Result<Vec<V>, RepositoryError>;
    fn count(&self, tenant_id: TenantId) -> Result<usize, RepositoryError>;
}

impl<K, V, S> TenantStore<K, V> for Arc<S>
where
    S: TenantStore<K, V> + ?Sized,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, RepositoryError> {
        (**self).get(tenant_id, key)
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), RepositoryError> {
        (**self).upsert(tenant_id, key, value)
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, RepositoryError> {
        (**self).remove(tenant_id, key)
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<V>, RepositoryError> {
        (**self).list(tenant_id)
    }

    fn count(&self, tenant_id: TenantId) -> Result<usize, RepositoryError> {
        (**self).count(tenant_id)
    }
}

/// In-memory tenant-isolated store for tests/dev.
#[derive(Debug)]
pub struct InMemoryTenantStore<K, V> {
    inner: RwLock<HashMap<(TenantId, K), V>>,
}

impl<K, V> InMemoryTenantStore<K, V> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> Default for InMemoryTenantStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> TenantStore<K, V> for InMemoryTenantStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn get(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, RepositoryError> {
        let map = self.inner.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(map.get(&(tenant_id, key.clone())).cloned())
    }

    fn upsert(&self, tenant_id: TenantId, key: K, value: V) -> Result<(), RepositoryError> {
        let mut map = self.inner.write().map_err(|_| RepositoryError::poisoned())?;
        map.insert((tenant_id, key), value);
        Ok(())
    }

    fn remove(&self, tenant_id: TenantId, key: &K) -> Result<Option<V>, RepositoryError> {
        let mut map = self.inner.write().map_err(|_| RepositoryError::poisoned())?;
        Ok(map.remove(&(tenant_id, key.clone())))
    }

    fn list(&self, tenant_id: TenantId) -> Result<Vec<V>, RepositoryError> {
        let map = self.inner.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(map
            .iter()
            .filter(|((t, _), _)| *t == tenant_id)
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn count(&self, tenant_id: TenantId) -> Result<usize, RepositoryError> {
        let map = self.inner.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(map.keys().filter(|(t, _)| *t == tenant_id).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenants_do_not_see_each_other() {
        let store: InMemoryTenantStore<u32, &'static str> = InMemoryTenantStore::new();
        let a = TenantId::new(7);
        let b = TenantId::new(9);

        store.upsert(a, 1, "seven").unwrap();
        store.upsert(b, 1, "nine").unwrap();

        assert_eq!(store.get(a, &1).unwrap(), Some("seven"));
        assert_eq!(store.get(b, &1).unwrap(), Some("nine"));
        assert_eq!(store.list(a).unwrap(), vec!["seven"]);
        assert_eq!(store.count(b).unwrap(), 1);
        assert_eq!(store.get(TenantId::new(1), &1).unwrap(), None);

        assert_eq!(store.remove(b, &1).unwrap(), Some("nine"));
        assert_eq!(store.get(b, &1).unwrap(), None);
        assert_eq!(store.get(a, &1).unwrap(), Some("seven"));
    }
}
