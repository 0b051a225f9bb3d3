//! API key record and its derived lifecycle state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored API key.
///
/// Records are never updated after creation. `expires_at` is advisory: an
/// expired record stays in the store until it is explicitly deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub id: i32,
    pub name: String,
    /// The bearer token. Unique across all records.
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Values needed to insert a new record; `id` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub name: String,
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Lifecycle state of a key that still exists in the store.
///
/// `Deleted` is not represented: a deleted key has no record left to carry
/// a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyState {
    Active,
    Expired,
}

impl ApiKey {
    /// Derive the state at `now`. A key whose expiry equals `now` is expired.
    pub fn state_at(&self, now: DateTime<Utc>) -> KeyState {
        match self.expires_at {
            Some(expires_at) if expires_at <= now => KeyState::Expired,
            _ => KeyState::Active,
        }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == KeyState::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn key(expires_at: Option<DateTime<Utc>>) -> ApiKey {
        ApiKey {
            id: 1,
            name: "svc".to_string(),
            key: "secret".to_string(),
            created_at: Utc::now(),
            expires_at,
        }
    }

    #[test]
    fn key_without_expiry_never_expires() {
        let k = key(None);
        assert_eq!(k.state_at(Utc::now() + Duration::days(36500)), KeyState::Active);
    }

    #[test]
    fn state_is_a_function_of_time() {
        let now = Utc::now();
        let k = key(Some(now + Duration::hours(1)));
        assert_eq!(k.state_at(now), KeyState::Active);
        assert_eq!(k.state_at(now + Duration::hours(1)), KeyState::Expired);
        assert_eq!(k.state_at(now + Duration::hours(2)), KeyState::Expired);
    }
}
