//! REST API request handlers

pub mod api_keys;
pub mod health;
