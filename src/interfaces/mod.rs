//! Interface adapters (inbound)

pub mod http;
