//! Domain layer - core entities, types and repository traits

pub mod api_key;
pub mod error;

pub use api_key::{ApiKey, ApiKeyRepository, KeyState, NewApiKey};
pub use error::{DomainError, DomainResult};
