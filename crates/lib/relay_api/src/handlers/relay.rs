//! Agent relay handler.
//!
//! Single endpoint `GET|POST /api/agent_httptrigger` that:
//! 1. Reads `message`, `agentid`, `threadid` from the query string
//! 2. Fills whatever is still missing from a JSON body
//! 3. Forwards the message to the agent service
//! 4. Returns the agent's latest reply and the thread id to continue on

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use relay_core::relay::{self, RelayInput, RelayReply};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use utoipa::{IntoParams, ToSchema};

use crate::AppState;
use crate::config::PROJECT_ENDPOINT_ENV;
use crate::error::{AppError, AppResult};

/// Body of the 400 response.
pub const MISSING_INPUT_MESSAGE: &str = "Pass in a message and agentid in the query string or in the request body for a personalized response.";

/// Relay request fields, accepted from the query string or a JSON body.
#[derive(Debug, Clone, Default, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct RelayParams {
    /// Message to send to the agent.
    #[param(required = true)]
    #[schema(required = true)]
    pub message: Option<String>,
    /// Id of the agent to talk to.
    #[param(required = true)]
    #[schema(required = true)]
    pub agentid: Option<String>,
    /// Thread to continue. A new thread is created when omitted.
    pub threadid: Option<String>,
}

impl RelayParams {
    /// Reads the fields from decoded query pairs. The first occurrence of a
    /// repeated key wins and unknown keys are ignored.
    pub fn from_query_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "message" => &mut params.message,
                "agentid" => &mut params.agentid,
                "threadid" => &mut params.threadid,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }

    /// Reads each field from a JSON object on its own, so a field of the
    /// wrong type counts as missing without discarding the others.
    fn from_json_object(object: &serde_json::Map<String, Value>) -> Self {
        let field = |name: &str| object.get(name).and_then(Value::as_str).map(str::to_owned);
        Self {
            message: field("message"),
            agentid: field("agentid"),
            threadid: field("threadid"),
        }
    }

    /// Drops empty values so they count as missing.
    fn normalized(self) -> Self {
        Self {
            message: self.message.filter(|v| !v.is_empty()),
            agentid: self.agentid.filter(|v| !v.is_empty()),
            threadid: self.threadid.filter(|v| !v.is_empty()),
        }
    }

    /// Keeps own values, taking missing ones from `other`.
    fn or(self, other: Self) -> Self {
        Self {
            message: self.message.or(other.message),
            agentid: self.agentid.or(other.agentid),
            threadid: self.threadid.or(other.threadid),
        }
    }
}

/// Successful relay reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    /// Text of the agent's latest reply.
    pub response: String,
    /// Thread to pass as `threadid` to continue the conversation.
    pub thread_id: String,
}

impl From<RelayReply> for RelayResponse {
    fn from(reply: RelayReply) -> Self {
        Self {
            response: reply.response,
            thread_id: reply.thread_id,
        }
    }
}

/// Resolves relay input: query values first, the JSON body only for fields
/// the query left missing. A body that is not a JSON object is ignored, and
/// body fields that are not strings count as missing.
pub fn resolve_input(query: RelayParams, body: &[u8]) -> Option<RelayInput> {
    let mut params = query.normalized();

    if (params.message.is_none() || params.agentid.is_none())
        && let Some(from_body) = parse_body(body)
    {
        params = params.or(from_body.normalized());
    }

    Some(RelayInput {
        message: params.message?,
        agent_id: params.agentid?,
        thread_id: params.threadid,
    })
}

fn parse_body(body: &[u8]) -> Option<RelayParams> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(object)) => Some(RelayParams::from_json_object(&object)),
        _ => None,
    }
}

/// Relay a message to a hosted agent.
///
/// Sends `message` to agent `agentid` on thread `threadid` (or a new thread)
/// and returns the agent's latest reply with the thread id.
#[utoipa::path(
    method(get, post),
    path = "/api/agent_httptrigger",
    params(RelayParams),
    request_body(
        content = RelayParams,
        description = "Alternative to the query string; query values take precedence",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Agent reply", body = RelayResponse),
        (status = 400, description = "message or agentid missing", body = String, content_type = "text/plain"),
        (status = 404, description = "Unknown agent", body = String, content_type = "text/plain"),
        (status = 500, description = "Misconfiguration or agent service failure", body = String, content_type = "text/plain")
    ),
    tag = "agent"
)]
pub async fn agent_relay(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
    body: Bytes,
) -> AppResult<Json<RelayResponse>> {
    let input = resolve_input(RelayParams::from_query_pairs(pairs), &body)
        .ok_or_else(|| AppError::Validation(MISSING_INPUT_MESSAGE.into()))?;

    let Some(agents) = state.agents.as_deref() else {
        error!("{PROJECT_ENDPOINT_ENV} is not set in the environment or configuration");
        return Err(AppError::Configuration(format!(
            "Missing {PROJECT_ENDPOINT_ENV}."
        )));
    };

    debug!(
        agent_id = %input.agent_id,
        thread_id = ?input.thread_id,
        "relaying message"
    );

    let agent_id = input.agent_id.clone();
    let reply = relay::relay_message(agents, input)
        .await
        .inspect_err(|e| match e {
            relay::RelayError::AgentNotFound(_) => warn!(agent_id = %agent_id, "agent not found"),
            relay::RelayError::Service(inner) => {
                error!(agent_id = %agent_id, error = %inner, details = ?inner, "agent relay failed")
            }
        })?;

    Ok(Json(reply.into()))
}
