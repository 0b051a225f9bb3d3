//! API Key management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use tracing::debug;

use crate::application::AuthContext;
use crate::interfaces::http::common::ValidatedJson;
use crate::interfaces::http::dto::{
    ApiKeyResponse, CreateApiKeyRequest, ListApiKeysQuery, MessageResponse,
};
use crate::interfaces::http::error::{ApiError, ErrorBody};
use crate::interfaces::http::AppState;

/// Create a new API key
///
/// Generates a fresh secret and returns the full record, secret included.
#[utoipa::path(
    post,
    path = "/api/keys",
    tag = "API Keys",
    security(("api_key" = [])),
    request_body = CreateApiKeyRequest,
    responses(
        (status = 201, description = "API key created", body = ApiKeyResponse),
        (status = 401, description = "Missing, invalid or expired credential", body = ErrorBody),
        (status = 422, description = "Request body failed validation", body = ErrorBody)
    )
)]
pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ValidatedJson(request): ValidatedJson<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<ApiKeyResponse>), ApiError> {
    debug!(principal = ?auth.principal, "Creating API key");
    let key = state.keys.create(request.name, request.expires_at).await?;
    Ok((StatusCode::CREATED, Json(key.into())))
}

/// List API keys
///
/// Returns every key, or only those whose name matches `name` exactly.
#[utoipa::path(
    get,
    path = "/api/keys",
    tag = "API Keys",
    security(("api_key" = [])),
    params(ListApiKeysQuery),
    responses(
        (status = 200, description = "List of API keys", body = Vec<ApiKeyResponse>),
        (status = 401, description = "Not authorized, or name filter required", body = ErrorBody)
    )
)]
pub async fn list_api_keys(
    State(state): State<AppState>,
    Query(query): Query<ListApiKeysQuery>,
) -> Result<Json<Vec<ApiKeyResponse>>, ApiError> {
    let name = query.name_filter();
    if name.is_none() && state.gate.policy().list_requires_name_filter() {
        return Err(ApiError::FilterRequired);
    }

    let keys = state.keys.list(name).await?;
    Ok(Json(keys.into_iter().map(ApiKeyResponse::from).collect()))
}

/// Get an API key by ID
#[utoipa::path(
    get,
    path = "/api/keys/{id}",
    tag = "API Keys",
    security(("api_key" = [])),
    params(("id" = i32, Path, description = "API key ID")),
    responses(
        (status = 200, description = "API key", body = ApiKeyResponse),
        (status = 401, description = "Not authorized", body = ErrorBody),
        (status = 404, description = "API key not found", body = ErrorBody)
    )
)]
pub async fn get_api_key(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<ApiKeyResponse>, ApiError> {
    let key = state.keys.get(id).await?;
    Ok(Json(key.into()))
}

/// Get API keys by name
#[utoipa::path(
    get,
    path = "/api/keys/name/{name}",
    tag = "API Keys",
    security(("api_key" = [])),
    params(("name" = String, Path, description = "Exact key name")),
    responses(
        (status = 200, description = "Keys carrying this name", body = Vec<ApiKeyResponse>),
        (status = 401, description = "Not authorized", body = ErrorBody),
        (status = 404, description = "No key carries this name", body = ErrorBody)
    )
)]
pub async fn get_api_keys_by_name(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<ApiKeyResponse>>, ApiError> {
    let keys = state.keys.get_by_name(&name).await?;
    Ok(Json(keys.into_iter().map(ApiKeyResponse::from).collect()))
}

/// Delete an API key
///
/// Removal is permanent. Deleting the same ID again yields 404.
#[utoipa::path(
    delete,
    path = "/api/keys/{id}",
    tag = "API Keys",
    security(("api_key" = [])),
    params(("id" = i32, Path, description = "API key ID")),
    responses(
        (status = 200, description = "API key deleted", body = MessageResponse),
        (status = 401, description = "Not authorized", body = ErrorBody),
        (status = 404, description = "API key not found", body = ErrorBody)
    )
)]
pub async fn delete_api_key(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<i32>,
) -> Result<Json<MessageResponse>, ApiError> {
    debug!(principal = ?auth.principal, key_id = id, "Deleting API key");
    state.keys.delete(id).await?;
    Ok(Json(MessageResponse {
        message: "API key deleted".to_string(),
    }))
}
