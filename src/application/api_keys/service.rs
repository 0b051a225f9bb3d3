//! Key lifecycle: create, list, look up and delete API keys

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info};

use crate::domain::{ApiKey, ApiKeyRepository, DomainError, DomainResult, NewApiKey};
use crate::infrastructure::crypto::{generate_api_key, MIN_SECRET_BYTES};

/// Creation-time rules. Both checks are off by default, matching a store that
/// accepts any name and any expiry.
#[derive(Debug, Clone)]
pub struct KeyPolicy {
    /// Random bytes behind each generated secret.
    pub secret_bytes: usize,
    /// Reject empty or whitespace-only names.
    pub require_name: bool,
    /// Reject `expires_at` earlier than the creation time.
    pub reject_expiry_before_creation: bool,
}

impl Default for KeyPolicy {
    fn default() -> Self {
        Self {
            secret_bytes: MIN_SECRET_BYTES,
            require_name: false,
            reject_expiry_before_creation: false,
        }
    }
}

pub struct ApiKeyService {
    keys: Arc<dyn ApiKeyRepository>,
    policy: KeyPolicy,
}

impl ApiKeyService {
    pub fn new(keys: Arc<dyn ApiKeyRepository>, policy: KeyPolicy) -> Self {
        Self { keys, policy }
    }

    /// Issue a new key. The returned record carries the generated secret.
    pub async fn create(
        &self,
        name: String,
        expires_at: Option<DateTime<Utc>>,
    ) -> DomainResult<ApiKey> {
        let created_at = Utc::now();

        if self.policy.require_name && name.trim().is_empty() {
            return Err(DomainError::Validation("name must not be empty".to_string()));
        }
        if self.policy.reject_expiry_before_creation
            && expires_at.is_some_and(|exp| exp < created_at)
        {
            return Err(DomainError::Validation(
                "expires_at must not be earlier than created_at".to_string(),
            ));
        }

        let new = NewApiKey {
            name,
            key: generate_api_key(self.policy.secret_bytes),
            created_at,
            expires_at,
        };

        let key = self.keys.insert(new).await.map_err(|e| {
            if let DomainError::Conflict(_) = e {
                error!("Generated API key collided with an existing one");
            }
            e
        })?;

        metrics::counter!("kms_api_keys_created_total").increment(1);
        info!(key_id = key.id, name = %key.name, expires_at = ?key.expires_at, "API key created");
        Ok(key)
    }

    pub async fn list(&self, name: Option<&str>) -> DomainResult<Vec<ApiKey>> {
        self.keys.list(name).await
    }

    pub async fn get(&self, id: i32) -> DomainResult<ApiKey> {
        self.keys.get_by_id(id).await
    }

    pub async fn get_by_name(&self, name: &str) -> DomainResult<Vec<ApiKey>> {
        self.keys.get_by_name(name).await
    }

    /// Permanently remove a key, active or expired. Deleting an id that is
    /// already gone is `NotFound`.
    pub async fn delete(&self, id: i32) -> DomainResult<()> {
        self.keys.delete(id).await?;
        metrics::counter!("kms_api_keys_deleted_total").increment(1);
        info!(key_id = id, "API key deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::infrastructure::storage::InMemoryApiKeyRepository;

    fn service(policy: KeyPolicy) -> ApiKeyService {
        ApiKeyService::new(Arc::new(InMemoryApiKeyRepository::new()), policy)
    }

    #[tokio::test]
    async fn create_generates_distinct_secrets() {
        let svc = service(KeyPolicy::default());
        let a = svc.create("svc-a".to_string(), None).await.unwrap();
        let b = svc.create("svc-a".to_string(), None).await.unwrap();

        assert_ne!(a.key, b.key);
        assert_ne!(a.id, b.id);
        assert!(a.key.len() >= 43);
        assert!(a.expires_at.is_none());
    }

    #[tokio::test]
    async fn past_expiry_is_accepted_by_default() {
        let svc = service(KeyPolicy::default());
        let past = Utc::now() - Duration::days(1);
        let key = svc.create("old".to_string(), Some(past)).await.unwrap();
        assert_eq!(key.expires_at, Some(past));
    }

    #[tokio::test]
    async fn optional_creation_rules() {
        let svc = service(KeyPolicy {
            require_name: true,
            reject_expiry_before_creation: true,
            ..KeyPolicy::default()
        });

        assert!(matches!(
            svc.create("  ".to_string(), None).await,
            Err(DomainError::Validation(_))
        ));
        assert!(matches!(
            svc.create("ok".to_string(), Some(Utc::now() - Duration::days(1)))
                .await,
            Err(DomainError::Validation(_))
        ));
        assert!(svc.create("ok".to_string(), None).await.is_ok());
    }

    #[tokio::test]
    async fn lifecycle_ends_in_not_found() {
        let svc = service(KeyPolicy::default());
        let key = svc.create("gone".to_string(), None).await.unwrap();

        svc.delete(key.id).await.unwrap();
        assert!(matches!(svc.get(key.id).await, Err(DomainError::NotFound { .. })));
        assert!(matches!(svc.delete(key.id).await, Err(DomainError::NotFound { .. })));
    }

    #[tokio::test]
    async fn list_by_name_returns_only_matches() {
        let svc = service(KeyPolicy::default());
        svc.create("x".to_string(), None).await.unwrap();
        svc.create("y".to_string(), None).await.unwrap();
        svc.create("x".to_string(), None).await.unwrap();

        let xs = svc.list(Some("x")).await.unwrap();
        assert_eq!(xs.len(), 2);
        assert!(xs.iter().all(|k| k.name == "x"));
        assert_eq!(svc.get_by_name("x").await.unwrap(), xs);
        assert!(matches!(
            svc.get_by_name("z").await,
            Err(DomainError::NotFound { field: "name", .. })
        ));
    }
}
