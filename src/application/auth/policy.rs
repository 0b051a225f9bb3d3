//! Authorization policy table
//!
//! Which credentials unlock which operation is deployment data, not code:
//! every [`Operation`] maps to an [`OperationPolicy`] holding an ordered list
//! of [`TrustCheck`]s. The table is built once from configuration and shared
//! read-only by the gate.

use std::collections::HashMap;
use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Operation kinds the gate can be asked about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    List,
    Get,
    Delete,
    Health,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::List,
        Operation::Get,
        Operation::Delete,
        Operation::Health,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::List => "list",
            Self::Get => "get",
            Self::Delete => "delete",
            Self::Health => "health",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One way a presented credential can be accepted.
#[derive(Debug)]
pub enum TrustCheck {
    /// Byte-for-byte (constant-time) match against a configured secret.
    StaticSecret { name: String, secret: SecretString },
    /// Lookup in the credential store; the record must not be expired.
    StoredKey,
}

impl TrustCheck {
    pub fn static_secret(name: impl Into<String>, secret: impl Into<String>) -> Self {
        Self::StaticSecret {
            name: name.into(),
            secret: SecretString::new(secret.into()),
        }
    }
}

/// Policy entry for one operation.
#[derive(Debug, Default)]
pub struct OperationPolicy {
    /// No credential required at all.
    pub public: bool,
    /// Tried in order until one accepts the credential.
    pub checks: Vec<TrustCheck>,
}

impl OperationPolicy {
    pub fn public() -> Self {
        Self {
            public: true,
            checks: Vec::new(),
        }
    }

    pub fn checks(checks: Vec<TrustCheck>) -> Self {
        Self {
            public: false,
            checks,
        }
    }

    pub fn stored_keys() -> Self {
        Self::checks(vec![TrustCheck::StoredKey])
    }
}

/// The full table. Operations without an entry deny every credential.
#[derive(Debug, Default)]
pub struct AuthPolicy {
    operations: HashMap<Operation, OperationPolicy>,
    list_requires_name_filter: bool,
}

impl AuthPolicy {
    /// An empty table that denies everything.
    pub fn deny_all() -> Self {
        Self::default()
    }

    /// Health is public; every other operation accepts unexpired stored keys.
    pub fn stored_keys_only() -> Self {
        Self::deny_all()
            .with(Operation::Create, OperationPolicy::stored_keys())
            .with(Operation::List, OperationPolicy::stored_keys())
            .with(Operation::Get, OperationPolicy::stored_keys())
            .with(Operation::Delete, OperationPolicy::stored_keys())
            .with(Operation::Health, OperationPolicy::public())
    }

    pub fn with(mut self, operation: Operation, policy: OperationPolicy) -> Self {
        self.operations.insert(operation, policy);
        self
    }

    pub fn require_list_filter(mut self, required: bool) -> Self {
        self.list_requires_name_filter = required;
        self
    }

    pub fn get(&self, operation: Operation) -> Option<&OperationPolicy> {
        self.operations.get(&operation)
    }

    pub fn list_requires_name_filter(&self) -> bool {
        self.list_requires_name_filter
    }
}
