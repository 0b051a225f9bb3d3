//! Key Management Service: CLI server and admin tools
//!
//! ```sh
//! # Run with default config (~/.config/kms-service/config.toml)
//! kms-service serve
//!
//! # Custom config path and port
//! kms-service --config /etc/kms-service/config.toml serve --port 8080
//!
//! # Validate config without starting
//! kms-service check
//!
//! # Issue the first key (the default policy only trusts stored keys)
//! kms-service create-key --name bootstrap
//!
//! # Drop audit entries older than the retention window
//! kms-service prune-audit-log --retention-days 30
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use kms::application::ApiKeyService;
use kms::config::AppConfig;
use kms::domain::ApiKeyRepository;
use kms::infrastructure::audit::prune_audit_log;
use kms::infrastructure::{init_database, run_migrations, SeaOrmApiKeyRepository};
use kms::interfaces::http::dto::parse_timestamp;
use kms::server::{init_tracing, ServerHandle, ServerOptions};

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Key Management Service: API key registry with per-operation trust policies.
#[derive(Parser, Debug)]
#[command(
    name = "kms-service",
    version,
    about = "API key management service",
    long_about = "HTTP service that issues, lists and deletes API keys and guards \
                  every operation with a configurable table of trust checks.\n\n\
                  Default config: ~/.config/kms-service/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "KMS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve {
        /// Override the listen port.
        #[arg(long)]
        port: Option<u16>,

        /// Skip database migrations on startup.
        #[arg(long)]
        no_migrate: bool,
    },
    /// Validate the configuration and exit.
    Check,
    /// Issue a key directly against the database and print it as JSON.
    CreateKey {
        #[arg(long)]
        name: String,

        /// RFC 3339, or naive ISO-8601 read as UTC.
        #[arg(long, value_parser = parse_expiry)]
        expires_at: Option<chrono::DateTime<Utc>>,
    },
    /// Remove audit entries older than the retention window.
    PruneAuditLog {
        /// Audit file; defaults to `audit.path` from the config.
        #[arg(long)]
        path: Option<PathBuf>,

        /// Defaults to `audit.retention_days` from the config.
        #[arg(long)]
        retention_days: Option<i64>,
    },
}

fn parse_expiry(raw: &str) -> Result<chrono::DateTime<Utc>, String> {
    parse_timestamp(raw).ok_or_else(|| format!("invalid timestamp: {}", raw))
}

/// Read the config file, or fall back to defaults if it does not exist.
/// Environment overrides apply either way.
fn load_config(path: &Path) -> CliResult<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    let mut config = AppConfig::default();
    config.apply_env_overrides(std::env::vars());
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(kms::default_config_path);
    let mut config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", config_path.display(), e);
            return Err(e);
        }
    };
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    init_tracing(&config);
    if config_path.exists() {
        info!("Configuration loaded from {}", config_path.display());
    } else {
        info!("No config at {}, using defaults", config_path.display());
    }

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        no_migrate: false,
    }) {
        Command::Serve { port, no_migrate } => {
            if let Some(port) = port {
                info!("CLI override: port = {}", port);
                config.server.port = port;
            }
            serve(config, !no_migrate).await
        }
        Command::Check => {
            println!("Configuration is valid");
            println!("   Config file : {}", config_path.display());
            println!("   Address     : {}", config.server.address());
            println!("   Database    : {}", config.database.url);
            println!("   Log level   : {}", config.logging.level);
            println!(
                "   Audit log   : {}",
                config
                    .audit
                    .path
                    .as_deref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "tracing".to_string())
            );
            Ok(())
        }
        Command::CreateKey { name, expires_at } => create_key(&config, name, expires_at).await,
        Command::PruneAuditLog {
            path,
            retention_days,
        } => {
            let Some(path) = path.or_else(|| config.audit.path.clone()) else {
                error!("No audit file configured; pass --path");
                return Err("no audit file configured".into());
            };
            let days = retention_days.unwrap_or(config.audit.retention_days);
            if days < 1 {
                return Err("--retention-days must be positive".into());
            }
            let report = prune_audit_log(&path, chrono::Duration::days(days), Utc::now()).await?;
            println!(
                "Pruned {}: kept {}, removed {}",
                path.display(),
                report.kept,
                report.removed
            );
            Ok(())
        }
    }
}

async fn serve(config: AppConfig, auto_migrate: bool) -> CliResult {
    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate,
    })
    .await?;

    handle.install_signal_handler();
    info!("Press Ctrl+C to shutdown gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;
    Ok(())
}

async fn create_key(
    config: &AppConfig,
    name: String,
    expires_at: Option<chrono::DateTime<Utc>>,
) -> CliResult {
    let db = init_database(&config.database.to_database_config()).await?;
    run_migrations(&db).await?;

    let repo: Arc<dyn ApiKeyRepository> = Arc::new(SeaOrmApiKeyRepository::new(db.clone()));
    let service = ApiKeyService::new(repo, config.keys.to_key_policy());
    let key = service.create(name, expires_at).await?;

    println!("{}", serde_json::to_string_pretty(&key)?);
    db.close().await?;
    Ok(())
}
