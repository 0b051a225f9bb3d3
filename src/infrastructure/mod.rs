//! Infrastructure layer - external concerns

pub mod audit;
pub mod crypto;
pub mod database;
pub mod storage;

pub use database::{init_database, run_migrations, DatabaseConfig, SeaOrmApiKeyRepository};
pub use storage::InMemoryApiKeyRepository;
