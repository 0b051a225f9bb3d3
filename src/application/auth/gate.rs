//! Auth gate: decides ALLOW/DENY for a presented credential and operation

use std::sync::Arc;

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use thiserror::Error;
use tracing::{debug, error};

use super::policy::{AuthPolicy, Operation, TrustCheck};
use crate::domain::{ApiKeyRepository, DomainError, KeyState};
use crate::infrastructure::crypto::constant_time_eq;

/// Reasons the gate refuses a request.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing API key")]
    MissingCredential,

    #[error("Invalid API key")]
    InvalidCredential,

    #[error("API key has expired")]
    ExpiredCredential,

    /// The store failed while looking the credential up.
    #[error("Credential store unavailable")]
    Store(#[source] DomainError),
}

impl AuthError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCredential => "MISSING_CREDENTIAL",
            Self::InvalidCredential => "INVALID_CREDENTIAL",
            Self::ExpiredCredential => "EXPIRED_CREDENTIAL",
            Self::Store(_) => "INTERNAL_ERROR",
        }
    }
}

/// Who was let through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    /// Public operation, no credential checked.
    Anonymous,
    /// Matched the named static secret.
    StaticSecret { name: String },
    /// Matched a stored key.
    StoredKey { id: i32, name: String },
}

/// Authorization scope bound to an allowed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub operation: Operation,
    pub principal: Principal,
}

#[derive(Clone)]
pub struct AuthGate {
    policy: Arc<AuthPolicy>,
    keys: Arc<dyn ApiKeyRepository>,
}

impl AuthGate {
    pub fn new(policy: AuthPolicy, keys: Arc<dyn ApiKeyRepository>) -> Self {
        Self {
            policy: Arc::new(policy),
            keys,
        }
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    pub async fn authorize(
        &self,
        operation: Operation,
        credential: Option<&str>,
    ) -> Result<AuthContext, AuthError> {
        self.authorize_at(operation, credential, Utc::now()).await
    }

    /// Evaluate the policy entry for `operation` with expiry judged at `now`.
    ///
    /// A credential accepted for one operation carries no weight for another;
    /// each call consults only its own entry.
    pub async fn authorize_at(
        &self,
        operation: Operation,
        credential: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthContext, AuthError> {
        let result = self.evaluate(operation, credential, now).await;

        let outcome = match &result {
            Ok(_) => "allow",
            Err(e) => e.kind(),
        };
        metrics::counter!(
            "kms_auth_decisions_total",
            "operation" => operation.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        result
    }

    async fn evaluate(
        &self,
        operation: Operation,
        credential: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<AuthContext, AuthError> {
        let entry = self.policy.get(operation);

        if entry.is_some_and(|p| p.public) {
            return Ok(AuthContext {
                operation,
                principal: Principal::Anonymous,
            });
        }

        let credential = credential
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let Some(entry) = entry else {
            debug!(%operation, "No policy entry, denying");
            return Err(AuthError::InvalidCredential);
        };

        let mut saw_expired = false;
        for check in &entry.checks {
            match check {
                TrustCheck::StaticSecret { name, secret } => {
                    if constant_time_eq(credential, secret.expose_secret()) {
                        return Ok(AuthContext {
                            operation,
                            principal: Principal::StaticSecret { name: name.clone() },
                        });
                    }
                }
                TrustCheck::StoredKey => match self.keys.get_by_secret(credential).await {
                    Ok(key) => match key.state_at(now) {
                        KeyState::Active => {
                            return Ok(AuthContext {
                                operation,
                                principal: Principal::StoredKey {
                                    id: key.id,
                                    name: key.name,
                                },
                            })
                        }
                        KeyState::Expired => {
                            debug!(key_id = key.id, %operation, "Stored key is expired");
                            saw_expired = true;
                        }
                    },
                    Err(DomainError::NotFound { .. }) => {}
                    Err(e) => {
                        error!(%operation, "Stored key lookup failed: {}", e);
                        return Err(AuthError::Store(e));
                    }
                },
            }
        }

        if saw_expired {
            Err(AuthError::ExpiredCredential)
        } else {
            Err(AuthError::InvalidCredential)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::application::auth::policy::OperationPolicy;
    use crate::domain::NewApiKey;
    use crate::infrastructure::storage::InMemoryApiKeyRepository;

    fn per_operation_policy() -> AuthPolicy {
        AuthPolicy::deny_all()
            .with(
                Operation::Create,
                OperationPolicy::checks(vec![TrustCheck::static_secret("creator", "create-secret")]),
            )
            .with(
                Operation::Delete,
                OperationPolicy::checks(vec![TrustCheck::static_secret("deleter", "delete-secret")]),
            )
            .with(
                Operation::Get,
                OperationPolicy::checks(vec![
                    TrustCheck::static_secret("reader", "read-secret"),
                    TrustCheck::StoredKey,
                ]),
            )
            .with(Operation::Health, OperationPolicy::public())
    }

    async fn gate_with_key(expires_at: Option<DateTime<Utc>>) -> (AuthGate, String) {
        let repo = Arc::new(InMemoryApiKeyRepository::new());
        let key = repo
            .insert(NewApiKey {
                name: "svc".to_string(),
                key: "stored-secret".to_string(),
                created_at: Utc::now(),
                expires_at,
            })
            .await
            .unwrap();
        (AuthGate::new(per_operation_policy(), repo), key.key)
    }

    #[tokio::test]
    async fn missing_header_is_missing_credential() {
        let (gate, _) = gate_with_key(None).await;
        assert!(matches!(
            gate.authorize(Operation::Get, None).await,
            Err(AuthError::MissingCredential)
        ));
        assert!(matches!(
            gate.authorize(Operation::Get, Some("   ")).await,
            Err(AuthError::MissingCredential)
        ));
    }

    #[tokio::test]
    async fn unknown_value_is_invalid_credential() {
        let (gate, _) = gate_with_key(None).await;
        assert!(matches!(
            gate.authorize(Operation::Get, Some("well-formed-but-unknown")).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn static_secret_scope_does_not_cross_operations() {
        let (gate, _) = gate_with_key(None).await;

        let ctx = gate
            .authorize(Operation::Create, Some("create-secret"))
            .await
            .unwrap();
        assert_eq!(
            ctx.principal,
            Principal::StaticSecret {
                name: "creator".to_string()
            }
        );

        assert!(matches!(
            gate.authorize(Operation::Delete, Some("create-secret")).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn stored_key_allowed_only_where_policy_says_so() {
        let (gate, secret) = gate_with_key(None).await;

        let ctx = gate.authorize(Operation::Get, Some(&secret)).await.unwrap();
        assert!(matches!(ctx.principal, Principal::StoredKey { .. }));

        assert!(matches!(
            gate.authorize(Operation::Create, Some(&secret)).await,
            Err(AuthError::InvalidCredential)
        ));
    }

    #[tokio::test]
    async fn expired_stored_key_has_its_own_reason() {
        let (gate, secret) = gate_with_key(Some(Utc::now() - Duration::minutes(1))).await;
        assert!(matches!(
            gate.authorize(Operation::Get, Some(&secret)).await,
            Err(AuthError::ExpiredCredential)
        ));
    }

    #[tokio::test]
    async fn expiry_is_judged_at_check_time() {
        let now = Utc::now();
        let (gate, secret) = gate_with_key(Some(now + Duration::hours(1))).await;

        assert!(gate.authorize_at(Operation::Get, Some(&secret), now).await.is_ok());
        assert!(matches!(
            gate.authorize_at(Operation::Get, Some(&secret), now + Duration::hours(2))
                .await,
            Err(AuthError::ExpiredCredential)
        ));
    }

    #[tokio::test]
    async fn public_and_unlisted_operations() {
        let (gate, _) = gate_with_key(None).await;

        let ctx = gate.authorize(Operation::Health, None).await.unwrap();
        assert_eq!(ctx.principal, Principal::Anonymous);

        // List has no entry in this table
        assert!(matches!(
            gate.authorize(Operation::List, Some("create-secret")).await,
            Err(AuthError::InvalidCredential)
        ));
    }
}
