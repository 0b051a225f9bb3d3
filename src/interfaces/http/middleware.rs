//! Authentication middleware for Axum
//!
//! Each protected route carries a [`GuardState`] naming its [`Operation`].
//! The guard reads `X-API-Key`, asks the [`AuthGate`](crate::application::AuthGate)
//! for a decision, writes one audit entry and either forwards the request with
//! an [`AuthContext`](crate::application::AuthContext) extension or answers
//! with the error.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::debug;

use crate::application::Operation;
use crate::infrastructure::audit::AuditEntry;
use crate::interfaces::http::error::ApiError;
use crate::interfaces::http::AppState;

/// Header carrying the credential
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Middleware state: the shared application state plus the operation being guarded
#[derive(Clone)]
pub struct GuardState {
    pub app: AppState,
    pub operation: Operation,
}

impl GuardState {
    pub fn new(app: AppState, operation: Operation) -> Self {
        Self { app, operation }
    }
}

fn extract_credential(request: &Request) -> Option<String> {
    request
        .headers()
        .get(API_KEY_HEADER)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
}

/// API key authentication middleware
pub async fn require_api_key(
    State(guard): State<GuardState>,
    mut request: Request,
    next: Next,
) -> Response {
    let credential = extract_credential(&request);
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());

    let decision = guard
        .app
        .gate
        .authorize(guard.operation, credential.as_deref())
        .await;

    let outcome = match &decision {
        Ok(_) => "allow",
        Err(e) => e.kind(),
    };
    debug!(operation = %guard.operation, outcome, "Auth decision");

    let entry = AuditEntry {
        timestamp: Utc::now(),
        credential,
        method: request.method().to_string(),
        endpoint: request.uri().path().to_string(),
        client_addr,
        outcome: outcome.to_string(),
    };
    guard.app.audit.record(&entry).await;

    match decision {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}
