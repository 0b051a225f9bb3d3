//! # Key Management Service
//!
//! HTTP service that issues, lists, looks up and deletes API keys, and guards
//! every operation with a configurable table of trust checks.
//!
//! ## Architecture
//!
//! The project follows Clean Architecture principles:
//!
//! - **domain**: the API key record, its lifecycle and the repository port
//! - **application**: key registry service and the auth gate
//! - **infrastructure**: SQLite persistence, in-memory store, secret generation, audit log
//! - **interfaces**: REST API with Swagger documentation
//! - **server**: runtime wiring and graceful shutdown

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use infrastructure::{init_database, run_migrations, DatabaseConfig};

pub use interfaces::http::{create_router, AppState};

pub use server::{ServerHandle, ServerOptions};
