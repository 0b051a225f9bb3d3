pub mod model;
pub mod repository;

pub use model::{ApiKey, KeyState, NewApiKey};
pub use repository::ApiKeyRepository;
