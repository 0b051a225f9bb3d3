//! API Key DTOs

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::domain::ApiKey;

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[schema(example = json!({
    "name": "svc-a",
    "expires_at": "2030-01-01T00:00:00Z"
}))]
pub struct CreateApiKeyRequest {
    /// Free-text label, used to group and filter keys
    #[validate(length(max = 255, message = "name must be at most 255 characters"))]
    pub name: String,
    /// Optional expiry. RFC 3339, or a naive ISO-8601 timestamp read as UTC
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// A stored API key, secret included
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiKeyResponse {
    pub id: i32,
    pub name: String,
    /// The bearer token to send in `X-API-Key`
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(k: ApiKey) -> Self {
        Self {
            id: k.id,
            name: k.name,
            key: k.key,
            created_at: k.created_at,
            expires_at: k.expires_at,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListApiKeysQuery {
    /// Exact-match name filter
    pub name: Option<String>,
}

impl ListApiKeysQuery {
    /// `?name=` with an empty value counts as no filter.
    pub fn name_filter(&self) -> Option<&str> {
        self.name.as_deref().filter(|n| !n.is_empty())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

fn deserialize_optional_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    parse_timestamp(&raw)
        .map(Some)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}

/// Parse RFC 3339, falling back to a naive ISO-8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
