pub mod service;

pub use service::{ApiKeyService, KeyPolicy};
