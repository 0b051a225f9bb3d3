pub mod api_key;

pub use api_key::{constant_time_eq, generate_api_key, MIN_SECRET_BYTES};
