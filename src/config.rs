//! Application configuration
//!
//! Loaded once at startup from a TOML file (default
//! `~/.config/kms-service/config.toml`), then overlaid with environment
//! variables:
//!
//! - `DATABASE_URL` replaces `database.url`;
//! - `KMS_STATIC_SECRET_<NAME>` sets `auth.static_secrets.<name>`.
//!
//! Example:
//!
//! ```toml
//! [server]
//! port = 8000
//!
//! [audit]
//! path = "/var/log/kms/audit.log"
//! credential_logging = "masked"
//!
//! [auth.static_secrets]
//! creator = "change-me"
//!
//! [auth.policy.create]
//! checks = [{ type = "static_secret", secret = "creator" }]
//!
//! [auth.policy.get]
//! checks = [{ type = "static_secret", secret = "creator" }, { type = "stored_key" }]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::application::auth::{AuthPolicy, Operation, OperationPolicy, TrustCheck};
use crate::application::KeyPolicy;
use crate::infrastructure::audit::CredentialLogging;
use crate::infrastructure::crypto::MIN_SECRET_BYTES;
use crate::infrastructure::DatabaseConfig;

/// Prefix of environment variables that provide static secret values.
pub const STATIC_SECRET_ENV_PREFIX: &str = "KMS_STATIC_SECRET_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kms-service")
        .join("config.toml")
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub logging: LoggingConfig,
    pub audit: AuditConfig,
    pub keys: KeysConfig,
    pub auth: AuthConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight requests on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            url: defaults.url,
            max_connections: defaults.max_connections,
            min_connections: defaults.min_connections,
            connect_timeout_secs: defaults.connect_timeout.as_secs(),
        }
    }
}

impl DatabaseSettings {
    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Append-only audit file. Without it entries only go to the `audit`
    /// tracing target.
    pub path: Option<PathBuf>,
    pub credential_logging: CredentialLogging,
    pub retention_days: i64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            path: None,
            credential_logging: CredentialLogging::Plain,
            retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeysConfig {
    pub secret_bytes: usize,
    pub require_name: bool,
    pub reject_expiry_before_creation: bool,
}

impl Default for KeysConfig {
    fn default() -> Self {
        let defaults = KeyPolicy::default();
        Self {
            secret_bytes: defaults.secret_bytes,
            require_name: defaults.require_name,
            reject_expiry_before_creation: defaults.reject_expiry_before_creation,
        }
    }
}

impl KeysConfig {
    pub fn to_key_policy(&self) -> KeyPolicy {
        KeyPolicy {
            secret_bytes: self.secret_bytes,
            require_name: self.require_name,
            reject_expiry_before_creation: self.reject_expiry_before_creation,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve Prometheus metrics at `/metrics`
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A trust check as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TrustCheckConfig {
    /// Refers to an entry of `auth.static_secrets` by name.
    StaticSecret { secret: String },
    StoredKey,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PolicyEntryConfig {
    pub public: bool,
    pub checks: Vec<TrustCheckConfig>,
}

impl PolicyEntryConfig {
    fn stored_key() -> Self {
        Self {
            public: false,
            checks: vec![TrustCheckConfig::StoredKey],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PolicyTableConfig {
    pub create: PolicyEntryConfig,
    pub list: PolicyEntryConfig,
    pub get: PolicyEntryConfig,
    pub delete: PolicyEntryConfig,
    pub health: PolicyEntryConfig,
}

impl Default for PolicyTableConfig {
    fn default() -> Self {
        Self {
            create: PolicyEntryConfig::stored_key(),
            list: PolicyEntryConfig::stored_key(),
            get: PolicyEntryConfig::stored_key(),
            delete: PolicyEntryConfig::stored_key(),
            health: PolicyEntryConfig {
                public: true,
                checks: Vec::new(),
            },
        }
    }
}

impl PolicyTableConfig {
    pub fn entry(&self, operation: Operation) -> &PolicyEntryConfig {
        match operation {
            Operation::Create => &self.create,
            Operation::List => &self.list,
            Operation::Get => &self.get,
            Operation::Delete => &self.delete,
            Operation::Health => &self.health,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// `GET /api/keys` without `?name=` is refused
    pub list_requires_name_filter: bool,
    pub static_secrets: BTreeMap<String, SecretString>,
    pub policy: PolicyTableConfig,
}

impl AuthConfig {
    /// Build the runtime policy table handed to the auth gate.
    pub fn build_policy(&self) -> Result<AuthPolicy, ConfigError> {
        let mut policy = AuthPolicy::deny_all().require_list_filter(self.list_requires_name_filter);

        for operation in Operation::ALL {
            let entry = self.policy.entry(operation);
            if entry.public {
                policy = policy.with(operation, OperationPolicy::public());
                continue;
            }

            let mut checks = Vec::with_capacity(entry.checks.len());
            for check in &entry.checks {
                checks.push(match check {
                    TrustCheckConfig::StaticSecret { secret } => {
                        let value = self.static_secrets.get(secret).ok_or_else(|| {
                            ConfigError::Invalid(format!(
                                "auth.policy.{} refers to undefined static secret '{}'",
                                operation, secret
                            ))
                        })?;
                        TrustCheck::StaticSecret {
                            name: secret.clone(),
                            secret: SecretString::new(value.expose_secret().clone()),
                        }
                    }
                    TrustCheckConfig::StoredKey => TrustCheck::StoredKey,
                });
            }
            policy = policy.with(operation, OperationPolicy::checks(checks));
        }

        Ok(policy)
    }
}

impl AppConfig {
    /// Read, parse, apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&raw)?;
        config.apply_env_overrides(std::env::vars());
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env_overrides(&mut self, vars: impl IntoIterator<Item = (String, String)>) {
        for (name, value) in vars {
            if name == "DATABASE_URL" {
                self.database.url = value;
            } else if let Some(secret_name) = name.strip_prefix(STATIC_SECRET_ENV_PREFIX) {
                self.auth
                    .static_secrets
                    .insert(secret_name.to_lowercase(), SecretString::new(value));
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keys.secret_bytes < MIN_SECRET_BYTES {
            return Err(ConfigError::Invalid(format!(
                "keys.secret_bytes must be at least {}",
                MIN_SECRET_BYTES
            )));
        }
        if self.audit.retention_days < 1 {
            return Err(ConfigError::Invalid(
                "audit.retention_days must be positive".to_string(),
            ));
        }
        if let Some((name, _)) = self
            .auth
            .static_secrets
            .iter()
            .find(|(_, v)| v.expose_secret().is_empty())
        {
            return Err(ConfigError::Invalid(format!(
                "static secret '{}' is empty",
                name
            )));
        }

        for operation in Operation::ALL {
            let entry = self.auth.policy.entry(operation);
            if !entry.public && entry.checks.is_empty() {
                warn!("auth.policy.{} has no checks; every request will be denied", operation);
            }
        }

        self.auth.build_policy().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.audit.retention_days, 30);
        assert!(config.auth.policy.health.public);
        assert_eq!(config.auth.policy.create.checks, vec![TrustCheckConfig::StoredKey]);
    }

    #[test]
    fn parses_policy_table() {
        let config = AppConfig::from_toml_str(
            r#"
            [auth]
            list_requires_name_filter = true

            [auth.static_secrets]
            creator = "c"
            reader = "r"

            [auth.policy.create]
            checks = [{ type = "static_secret", secret = "creator" }]

            [auth.policy.get]
            checks = [{ type = "static_secret", secret = "reader" }, { type = "stored_key" }]

            [auth.policy.health]
            public = false
            checks = [{ type = "static_secret", secret = "reader" }]
            "#,
        )
        .unwrap();
        config.validate().unwrap();

        assert!(config.auth.list_requires_name_filter);
        assert_eq!(
            config.auth.policy.get.checks,
            vec![
                TrustCheckConfig::StaticSecret {
                    secret: "reader".to_string()
                },
                TrustCheckConfig::StoredKey
            ]
        );
        // Unlisted operations keep their defaults
        assert_eq!(config.auth.policy.delete.checks, vec![TrustCheckConfig::StoredKey]);

        let policy = config.auth.build_policy().unwrap();
        assert!(policy.list_requires_name_filter());
        assert!(!policy.get(Operation::Health).unwrap().public);
        assert_eq!(policy.get(Operation::Get).unwrap().checks.len(), 2);
    }

    #[test]
    fn undefined_secret_reference_is_rejected() {
        let config = AppConfig::from_toml_str(
            r#"
            [auth.policy.delete]
            checks = [{ type = "static_secret", secret = "deleter" }]
            "#,
        )
        .unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn env_overrides_fill_secrets_and_database() {
        let mut config = AppConfig::from_toml_str(
            r#"
            [auth.policy.delete]
            checks = [{ type = "static_secret", secret = "deleter" }]
            "#,
        )
        .unwrap();
        config.apply_env_overrides(vec![
            ("KMS_STATIC_SECRET_DELETER".to_string(), "d".to_string()),
            ("DATABASE_URL".to_string(), "sqlite::memory:".to_string()),
            ("UNRELATED".to_string(), "x".to_string()),
        ]);

        config.validate().unwrap();
        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(
            config.auth.static_secrets["deleter"].expose_secret(),
            "d"
        );
    }

    #[test]
    fn weak_secret_length_is_rejected() {
        let config = AppConfig::from_toml_str("[keys]\nsecret_bytes = 16\n").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = AppConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
