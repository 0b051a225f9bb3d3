//! Append-only audit log of credential use
//!
//! Every request that reaches the auth gate produces one [`AuditEntry`]. The
//! sink is opened at server start, injected into the HTTP layer and flushed on
//! shutdown. Old entries are pruned out of band by [`prune_audit_log`].

pub mod retention;
pub mod sink;

pub use retention::{prune_audit_log, PruneReport};
pub use sink::{AuditEntry, AuditSink, CredentialLogging, FileAuditSink, TracingAuditSink};

/// Separator between the fields of a rendered audit line.
pub const FIELD_SEPARATOR: &str = " | ";
