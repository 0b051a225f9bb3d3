//! HTTP REST API interfaces
//!
//! - `middleware`: per-operation API key guard and audit
//! - `metrics`: request counters and latency histograms
//! - `handlers`: request handlers
//! - `router`: API router with Swagger documentation

pub mod common;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod router;

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::application::{ApiKeyService, AuthGate};
use crate::infrastructure::audit::AuditSink;

pub use error::{ApiError, ErrorBody};
pub use middleware::API_KEY_HEADER;
pub use router::create_router;

/// State shared by every handler and guard
#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<ApiKeyService>,
    pub gate: AuthGate,
    pub audit: Arc<dyn AuditSink>,
    /// `None` when metrics are disabled
    pub metrics: Option<PrometheusHandle>,
}
