//! Route path constants.

/// GET, POST /api/agent_httptrigger — relay a message to an agent
pub const API_AGENT_HTTPTRIGGER: &str = "/api/agent_httptrigger";

/// GET /api/openapi.json — OpenAPI description as JSON
pub const GET_API_OPENAPI_JSON: &str = "/api/openapi.json";

/// GET /api/openapi.yaml — OpenAPI description as YAML
pub const GET_API_OPENAPI_YAML: &str = "/api/openapi.yaml";

/// GET /api/docs — Swagger UI (redirects to the index under /api/docs/)
pub const GET_API_DOCS: &str = "/api/docs";
