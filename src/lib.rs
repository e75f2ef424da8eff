pub mod api;
pub mod config;
pub mod infrastructure;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::AppConfig;
use crate::services::dispatcher::StorageDispatcher;
use crate::services::storage::Disk;
use crate::utils::auth::{AuthGate, PASSWORD_HEADER};
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// Multipart framing allowance on top of the file ceiling.
const MULTIPART_OVERHEAD: usize = 10 * 1024 * 1024;

fn body_limit(max_file_size: usize) -> usize {
    max_file_size.saturating_add(MULTIPART_OVERHEAD)
}

struct WebhookSecurityAddon;

impl Modify for WebhookSecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "webhook_password",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(PASSWORD_HEADER))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::health::root,
        api::handlers::health::health_check,
        api::handlers::webhook::set_data,
    ),
    components(
        schemas(
            api::handlers::health::StatusResponse,
            api::handlers::health::HealthResponse,
            api::handlers::webhook::SetRequest,
            models::ResponseEnvelope,
            models::ResponseStatus,
        )
    ),
    modifiers(&WebhookSecurityAddon),
    tags(
        (name = "webhook", description = "Data ingestion"),
        (name = "system", description = "Liveness and health probes")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthGate,
    pub dispatcher: StorageDispatcher,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(config: AppConfig, disk: Arc<dyn Disk>) -> Self {
        Self {
            auth: AuthGate::new(config.password.as_deref()),
            dispatcher: StorageDispatcher::new(disk, config.storage_timeout),
            config: Arc::new(config),
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/", get(api::handlers::health::root))
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/set",
            post(api::handlers::webhook::set_data)
                .layer(axum::extract::DefaultBodyLimit::max(body_limit(
                    state.config.max_file_size,
                )))
                .layer(from_fn_with_state(
                    state.clone(),
                    api::middleware::auth::password_middleware,
                )),
        )
        .layer(from_fn(api::middleware::security::security_headers))
        .with_state(state)
}
