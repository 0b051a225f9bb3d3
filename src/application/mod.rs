//! Application layer - use cases on top of the domain

pub mod api_keys;
pub mod auth;

pub use api_keys::{ApiKeyService, KeyPolicy};
pub use auth::{AuthContext, AuthError, AuthGate, AuthPolicy, Operation, Principal};
