//! API router with OpenAPI documentation

use axum::{
    middleware,
    routing::{delete, get, post, MethodRouter},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::Operation;
use crate::interfaces::http::dto::{ApiKeyResponse, CreateApiKeyRequest, MessageResponse};
use crate::interfaces::http::error::ErrorBody;
use crate::interfaces::http::handlers::{api_keys, health};
use crate::interfaces::http::metrics::track_http_metrics;
use crate::interfaces::http::middleware::{require_api_key, GuardState, API_KEY_HEADER};
use crate::interfaces::http::AppState;

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        api_keys::create_api_key,
        api_keys::list_api_keys,
        api_keys::get_api_key,
        api_keys::get_api_keys_by_name,
        api_keys::delete_api_key,
    ),
    components(schemas(
        health::HealthResponse,
        CreateApiKeyRequest,
        ApiKeyResponse,
        MessageResponse,
        ErrorBody,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Service liveness"),
        (name = "API Keys", description = "API key registry"),
    ),
    info(
        title = "Key Management Service",
        description = "Issue, look up and delete API keys. Every endpoint is guarded by a per-operation trust policy.",
    )
)]
pub struct ApiDoc;

/// Wrap a method router with the auth guard for `operation`.
fn guarded(
    state: &AppState,
    operation: Operation,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(
        GuardState::new(state.clone(), operation),
        require_api_key,
    ))
}

/// Build the full HTTP router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route(
            "/api/keys",
            guarded(&state, Operation::Create, post(api_keys::create_api_key))
                .merge(guarded(&state, Operation::List, get(api_keys::list_api_keys))),
        )
        .route(
            "/api/keys/create",
            guarded(&state, Operation::Create, post(api_keys::create_api_key)),
        )
        .route(
            "/api/keys/name/{name}",
            guarded(&state, Operation::Get, get(api_keys::get_api_keys_by_name)),
        )
        .route(
            "/api/keys/{id}",
            guarded(&state, Operation::Get, get(api_keys::get_api_key))
                .merge(guarded(
                    &state,
                    Operation::Delete,
                    delete(api_keys::delete_api_key),
                )),
        )
        .route("/", guarded(&state, Operation::Health, get(health::health_check)))
        .route(
            "/metrics",
            guarded(&state, Operation::Health, get(health::prometheus_metrics)),
        )
        .with_state(state);

    Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api)
        .layer(middleware::from_fn(track_http_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
