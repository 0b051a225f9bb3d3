//! Data Transfer Objects for REST API

pub mod api_key;

pub use api_key::*;
