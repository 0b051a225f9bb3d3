//! SeaORM entities

pub mod api_key;
