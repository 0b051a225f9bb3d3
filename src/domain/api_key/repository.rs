//! Credential store interface

use async_trait::async_trait;

use super::model::{ApiKey, NewApiKey};
use crate::domain::DomainResult;

/// Persistence for API key records.
///
/// Each call is atomic on its own; no operation spans more than one row.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Fails with `DomainError::Conflict` if `new.key` is already stored.
    async fn insert(&self, new: NewApiKey) -> DomainResult<ApiKey>;

    /// All records, or only those whose name matches exactly, in id order.
    async fn list(&self, name: Option<&str>) -> DomainResult<Vec<ApiKey>>;

    async fn get_by_id(&self, id: i32) -> DomainResult<ApiKey>;

    /// Fails with `NotFound` when no record carries this name.
    async fn get_by_name(&self, name: &str) -> DomainResult<Vec<ApiKey>>;

    async fn get_by_secret(&self, secret: &str) -> DomainResult<ApiKey>;

    async fn delete(&self, id: i32) -> DomainResult<()>;
}
