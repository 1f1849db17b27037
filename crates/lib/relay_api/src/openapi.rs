//! OpenAPI description of the relay, derived from the handler annotations.

use utoipa::OpenApi;

use crate::handlers::relay::{RelayParams, RelayResponse};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Agent Relay API",
        description = "Forwards a user message to a hosted AI agent and returns the agent's reply."
    ),
    paths(crate::handlers::relay::agent_relay),
    components(schemas(RelayParams, RelayResponse)),
    tags((name = "agent", description = "Relay messages to hosted agents"))
)]
pub struct ApiDoc;

/// The OpenAPI document served by the documentation routes.
pub fn document() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
