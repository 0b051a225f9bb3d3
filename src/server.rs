//! Reusable server runtime.
//!
//! [`ServerHandle`] owns the whole lifecycle: database, migrations, audit
//! sink, auth gate, REST API, metrics and graceful shutdown. The CLI binary
//! and the integration tests both start the service through it.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::application::{ApiKeyService, AuthGate};
use crate::config::{AppConfig, LogFormat};
use crate::domain::ApiKeyRepository;
use crate::infrastructure::audit::{AuditSink, CredentialLogging, FileAuditSink, TracingAuditSink};
use crate::infrastructure::{init_database, run_migrations, SeaOrmApiKeyRepository};
use crate::interfaces::http::{create_router, AppState};
use crate::shared::shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this twice is harmless.
pub fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let result = match config.logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    };
    if result.is_err() {
        warn!("Tracing subscriber already installed");
    }
}

/// The global metrics recorder can only be installed once per process, so
/// restarts within the same process reuse it.
fn prometheus_handle() -> Option<PrometheusHandle> {
    static HANDLE: OnceLock<Option<PrometheusHandle>> = OnceLock::new();

    HANDLE
        .get_or_init(|| match PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                info!("Prometheus metrics recorder installed");
                Some(handle)
            }
            Err(e) => {
                warn!("Failed to install Prometheus metrics recorder: {}", e);
                None
            }
        })
        .clone()
}

/// Options for starting the service.
pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

/// Handle to a running Key Management Service.
///
/// ```rust,no_run
/// use kms::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.install_signal_handler();
///     handle.wait().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Key registry, for callers embedding the service.
    pub keys: Arc<ApiKeyService>,
    /// Address the REST API is bound to.
    pub local_addr: SocketAddr,

    db: DatabaseConnection,
    audit: Arc<dyn AuditSink>,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the service.
    ///
    /// Connects to the database, runs migrations (if enabled), opens the audit
    /// sink, builds the auth gate from the policy table and starts serving.
    pub async fn start(opts: ServerOptions) -> Result<Self, Box<dyn std::error::Error>> {
        let config = opts.config;
        config.validate()?;

        info!("Starting Key Management Service...");

        let metrics = if config.metrics.enabled {
            prometheus_handle()
        } else {
            None
        };

        // ── Database ───────────────────────────────────────────
        let db_config = config.database.to_database_config();
        let db = init_database(&db_config).await?;
        if opts.auto_migrate {
            info!("Running database migrations...");
            run_migrations(&db).await?;
            info!("Migrations completed");
        }

        // ── Audit ──────────────────────────────────────────────
        let credential_logging = config.audit.credential_logging;
        if credential_logging == CredentialLogging::Plain {
            warn!("Audit log records full credentials (audit.credential_logging = \"plain\")");
        }
        let audit: Arc<dyn AuditSink> = match &config.audit.path {
            Some(path) => {
                let sink = FileAuditSink::open(path, credential_logging).await?;
                info!("Audit log: {}", path.display());
                Arc::new(sink)
            }
            None => {
                info!("Audit log: tracing target 'audit'");
                Arc::new(TracingAuditSink::new(credential_logging))
            }
        };

        // ── Services ───────────────────────────────────────────
        let repo: Arc<dyn ApiKeyRepository> = Arc::new(SeaOrmApiKeyRepository::new(db.clone()));
        let gate = AuthGate::new(config.auth.build_policy()?, repo.clone());
        let keys = Arc::new(ApiKeyService::new(repo, config.keys.to_key_policy()));

        let router = create_router(AppState {
            keys: keys.clone(),
            gate,
            audit: audit.clone(),
            metrics,
        });

        // ── REST API ───────────────────────────────────────────
        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout);
        let listener = tokio::net::TcpListener::bind(config.server.address()).await?;
        let local_addr = listener.local_addr()?;
        info!("REST API listening on http://{}", local_addr);
        info!("Swagger UI available at http://{}/docs/", local_addr);

        let api_shutdown = shutdown.signal();
        let api_server = axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        Ok(Self {
            keys,
            local_addr,
            db,
            audit,
            shutdown,
            api_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown without waiting for it.
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to stop, then flush the audit log and close the database.
    pub async fn wait(self) {
        match self.api_task.await {
            Ok(()) => info!("REST API server stopped"),
            Err(e) => error!("REST API server task panicked: {}", e),
        }

        let audit = self.audit;
        let db = self.db;
        let completed = self
            .shutdown
            .run_with_timeout(async move {
                if let Err(e) = audit.flush().await {
                    warn!("Failed to flush audit log: {}", e);
                }
                if let Err(e) = db.close().await {
                    warn!("Error closing database connection: {}", e);
                } else {
                    info!("Database connection closed");
                }
            })
            .await;

        if completed {
            info!("Key Management Service shutdown complete");
        }
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("Shutting down Key Management Service...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}
