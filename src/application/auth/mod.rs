//! Authentication and authorization

pub mod gate;
pub mod policy;

pub use gate::{AuthContext, AuthError, AuthGate, Principal};
pub use policy::{AuthPolicy, Operation, OperationPolicy, TrustCheck};
