//! In-memory API key repository

use std::sync::atomic::{AtomicI32, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{ApiKey, ApiKeyRepository, DomainError, DomainResult, NewApiKey};

/// In-memory credential store for development and testing
pub struct InMemoryApiKeyRepository {
    keys: DashMap<i32, ApiKey>,
    /// secret -> id, the uniqueness index
    by_secret: DashMap<String, i32>,
    id_counter: AtomicI32,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self {
            keys: DashMap::new(),
            by_secret: DashMap::new(),
            id_counter: AtomicI32::new(1),
        }
    }
}

impl Default for InMemoryApiKeyRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn insert(&self, new: NewApiKey) -> DomainResult<ApiKey> {
        // Claim the secret first so two concurrent inserts cannot both win
        let id = match self.by_secret.entry(new.key.clone()) {
            Entry::Occupied(_) => {
                return Err(DomainError::Conflict("api_key with this key".to_string()))
            }
            Entry::Vacant(slot) => {
                let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
                slot.insert(id);
                id
            }
        };

        let key = ApiKey {
            id,
            name: new.name,
            key: new.key,
            created_at: new.created_at,
            expires_at: new.expires_at,
        };
        self.keys.insert(id, key.clone());
        Ok(key)
    }

    async fn list(&self, name: Option<&str>) -> DomainResult<Vec<ApiKey>> {
        let mut keys: Vec<ApiKey> = self
            .keys
            .iter()
            .filter(|entry| name.map_or(true, |n| entry.name == n))
            .map(|entry| entry.value().clone())
            .collect();
        keys.sort_by_key(|k| k.id);
        Ok(keys)
    }

    async fn get_by_id(&self, id: i32) -> DomainResult<ApiKey> {
        self.keys
            .get(&id)
            .map(|k| k.value().clone())
            .ok_or_else(|| DomainError::key_not_found(id))
    }

    async fn get_by_name(&self, name: &str) -> DomainResult<Vec<ApiKey>> {
        let keys = self.list(Some(name)).await?;
        if keys.is_empty() {
            return Err(DomainError::name_not_found(name));
        }
        Ok(keys)
    }

    async fn get_by_secret(&self, secret: &str) -> DomainResult<ApiKey> {
        let id = *self
            .by_secret
            .get(secret)
            .ok_or_else(DomainError::secret_not_found)?;
        self.get_by_id(id)
            .await
            .map_err(|_| DomainError::secret_not_found())
    }

    async fn delete(&self, id: i32) -> DomainResult<()> {
        let (_, removed) = self
            .keys
            .remove(&id)
            .ok_or_else(|| DomainError::key_not_found(id))?;
        self.by_secret.remove(&removed.key);
        Ok(())
    }
}
