//! # relay_api
//!
//! HTTP API library for the agent relay.

pub mod config;
pub mod error;
pub mod handlers;
pub mod openapi;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use relay_core::agents::client::AgentsClient;
use relay_core::agents::credential::AmbientCredential;
use relay_core::agents::{AgentService, AgentServiceError};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::ApiConfig;
use crate::handlers::{docs, relay};

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// API configuration.
    pub config: ApiConfig,
    /// Agent service, present only when a project endpoint is configured.
    pub agents: Option<Arc<dyn AgentService>>,
}

impl AppState {
    /// Builds state from configuration, connecting to the configured project
    /// endpoint through the ambient credential chain.
    pub fn from_config(config: ApiConfig) -> Result<Self, AgentServiceError> {
        let agents = match &config.project_endpoint {
            Some(endpoint) => {
                let client = AgentsClient::new(endpoint, AmbientCredential::new())?
                    .with_poll_interval(config.run_poll_interval);
                Some(Arc::new(client) as Arc<dyn AgentService>)
            }
            None => None,
        };
        Ok(Self { config, agents })
    }

    /// Builds state around an existing agent service.
    pub fn with_agents(config: ApiConfig, agents: Arc<dyn AgentService>) -> Self {
        Self {
            config,
            agents: Some(agents),
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            routes::API_AGENT_HTTPTRIGGER,
            get(relay::agent_relay).post(relay::agent_relay),
        )
        .route(routes::GET_API_OPENAPI_YAML, get(docs::openapi_yaml))
        // Swagger UI also serves the JSON description it renders.
        .merge(
            SwaggerUi::new(routes::GET_API_DOCS)
                .url(routes::GET_API_OPENAPI_JSON, openapi::document()),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_without_endpoint_has_no_agents() {
        let state = AppState::from_config(ApiConfig::default()).expect("state");
        assert!(state.agents.is_none());
    }

    #[test]
    fn state_with_endpoint_builds_client() {
        let config = ApiConfig {
            project_endpoint: Some("https://x.services.ai.azure.com/api/projects/p".into()),
            ..ApiConfig::default()
        };
        let state = AppState::from_config(config).expect("state");
        assert!(state.agents.is_some());
    }

    #[test]
    fn invalid_endpoint_is_rejected() {
        let config = ApiConfig {
            project_endpoint: Some("not a url".into()),
            ..ApiConfig::default()
        };
        assert!(AppState::from_config(config).is_err());
    }
}
