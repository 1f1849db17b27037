//! HTTPS client for the Azure AI Foundry agent service.
//!
//! Talks to a project endpoint
//! (`https://<resource>.services.ai.azure.com/api/projects/<project>`)
//! using the `v1` REST surface. Runs are polled until they settle; there is
//! no retry of failed calls.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, warn};
use url::Url;

use super::credential::AmbientCredential;
use super::{
    Agent, AgentService, AgentServiceError, AgentThread, MessageRole, Result, RunStatus,
    ThreadMessage, ThreadRun,
};

/// `api-version` query value sent with every request.
pub const API_VERSION: &str = "v1";

/// Default delay between run status polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Page size used when listing thread messages.
const MESSAGE_PAGE_LIMIT: u32 = 100;

/// One page of a list endpoint.
#[derive(Debug, Deserialize)]
struct ListPage<T> {
    data: Vec<T>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    last_id: Option<String>,
}

/// Agent service client bound to one project endpoint.
pub struct AgentsClient {
    http: Client,
    endpoint: Url,
    credential: AmbientCredential,
    poll_interval: Duration,
}

impl AgentsClient {
    /// Creates a client for `endpoint`, authenticating with `credential`.
    pub fn new(endpoint: &str, credential: AmbientCredential) -> Result<Self> {
        let endpoint: Url = endpoint
            .trim()
            .parse()
            .map_err(|e| AgentServiceError::Endpoint(format!("{endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(AgentServiceError::Endpoint(endpoint.to_string()));
        }

        Ok(Self {
            http: Client::new(),
            endpoint,
            credential,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Overrides the run polling interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Project endpoint this client talks to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Builds `<endpoint>/<segments...>`, percent-encoding each segment.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| AgentServiceError::Endpoint(self.endpoint.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
        let url = self.url(segments)?;
        let token = self.credential.token().await?;
        Ok(self
            .http
            .request(method, url)
            .query(&[("api-version", API_VERSION)])
            .bearer_auth(token))
    }

    /// Sends the request and decodes a successful JSON reply.
    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = request.send().await?;
        decode(ensure_success(resp).await?).await
    }

    async fn get_run(&self, thread_id: &str, run_id: &str) -> Result<ThreadRun> {
        let req = self
            .request(Method::GET, &["threads", thread_id, "runs", run_id])
            .await?;
        self.execute(req).await
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> Result<ThreadRun> {
        let req = self
            .request(Method::POST, &["threads", thread_id, "runs", run_id, "cancel"])
            .await?;
        self.execute(req).await
    }
}

async fn ensure_success(resp: Response) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp
        .text()
        .await
        .unwrap_or_else(|_| "<no body>".to_string());
    Err(AgentServiceError::Status { status, body })
}

async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json()
        .await
        .map_err(|e| AgentServiceError::Decode(e.to_string()))
}

#[async_trait]
impl AgentService for AgentsClient {
    async fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>> {
        let resp = self
            .request(Method::GET, &["assistants", agent_id])
            .await?
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let agent = decode(ensure_success(resp).await?).await?;
        Ok(Some(agent))
    }

    async fn create_thread(&self) -> Result<AgentThread> {
        let req = self.request(Method::POST, &["threads"]).await?.json(&json!({}));
        self.execute(req).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage> {
        let req = self
            .request(Method::POST, &["threads", thread_id, "messages"])
            .await?
            .json(&json!({ "role": role, "content": content }));
        self.execute(req).await
    }

    async fn create_and_process_run(&self, thread_id: &str, agent_id: &str) -> Result<ThreadRun> {
        let req = self
            .request(Method::POST, &["threads", thread_id, "runs"])
            .await?
            .json(&json!({ "assistant_id": agent_id }));
        let mut run: ThreadRun = self.execute(req).await?;
        debug!(thread_id, run_id = %run.id, status = ?run.status, "run created");

        let mut cancel_requested = false;
        while !run.status.is_terminal() {
            sleep(self.poll_interval).await;
            run = self.get_run(thread_id, &run.id).await?;

            // The relay never submits tool outputs, so a run waiting on them
            // can only be cancelled.
            if run.status == RunStatus::RequiresAction && !cancel_requested {
                warn!(thread_id, run_id = %run.id, "run requires action; cancelling");
                run = self.cancel_run(thread_id, &run.id).await?;
                cancel_requested = true;
            }
        }

        debug!(thread_id, run_id = %run.id, status = ?run.status, "run settled");
        Ok(run)
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let limit = MESSAGE_PAGE_LIMIT.to_string();
        let mut messages = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut req = self
                .request(Method::GET, &["threads", thread_id, "messages"])
                .await?
                .query(&[("order", "asc"), ("limit", limit.as_str())]);
            if let Some(cursor) = &after {
                req = req.query(&[("after", cursor.as_str())]);
            }

            let page: ListPage<ThreadMessage> = self.execute(req).await?;
            messages.extend(page.data);

            match page.last_id {
                Some(last_id) if page.has_more => after = Some(last_id),
                _ => break,
            }
        }

        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;

    #[derive(Default)]
    struct FakeState {
        run_statuses: Vec<&'static str>,
        polls: usize,
        cancels: usize,
        posted: Vec<Value>,
    }

    type Shared = Arc<Mutex<FakeState>>;

    fn authorized(headers: &HeaderMap, query: &HashMap<String, String>) -> bool {
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == "Bearer test-token")
            && query.get("api-version").map(String::as_str) == Some(API_VERSION)
    }

    async fn get_assistant(
        Path(id): Path<String>,
        Query(query): Query<HashMap<String, String>>,
        headers: HeaderMap,
    ) -> Response {
        if !authorized(&headers, &query) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        if id == "asst_1" {
            Json(json!({"id": "asst_1", "object": "assistant", "name": "Helper", "model": "gpt-4o"}))
                .into_response()
        } else {
            (StatusCode::NOT_FOUND, "no such assistant").into_response()
        }
    }

    async fn create_thread() -> Json<Value> {
        Json(json!({"id": "thread_1", "object": "thread"}))
    }

    async fn create_message(
        State(state): State<Shared>,
        Path(thread_id): Path<String>,
        Json(body): Json<Value>,
    ) -> Json<Value> {
        state.lock().unwrap().posted.push(body.clone());
        Json(json!({
            "id": "msg_user",
            "thread_id": thread_id,
            "role": body["role"],
            "content": [{"type": "text", "text": {"value": body["content"], "annotations": []}}]
        }))
    }

    async fn create_run(State(state): State<Shared>, Json(body): Json<Value>) -> Json<Value> {
        state.lock().unwrap().posted.push(body);
        Json(json!({"id": "run_1", "status": "queued"}))
    }

    async fn get_run(State(state): State<Shared>) -> Json<Value> {
        let mut state = state.lock().unwrap();
        let idx = state.polls.min(state.run_statuses.len() - 1);
        state.polls += 1;
        Json(json!({"id": "run_1", "status": state.run_statuses[idx]}))
    }

    async fn cancel_run(State(state): State<Shared>) -> Json<Value> {
        state.lock().unwrap().cancels += 1;
        Json(json!({"id": "run_1", "status": "cancelling"}))
    }

    async fn list_messages(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
        assert_eq!(query.get("order").map(String::as_str), Some("asc"));
        match query.get("after").map(String::as_str) {
            None => Json(json!({
                "object": "list",
                "data": [{"id": "msg_1", "role": "user", "content": [{"type": "text", "text": {"value": "hello"}}]}],
                "first_id": "msg_1",
                "last_id": "msg_1",
                "has_more": true
            })),
            Some(_) => Json(json!({
                "object": "list",
                "data": [{"id": "msg_2", "role": "assistant", "content": [{"type": "text", "text": {"value": "hi"}}]}],
                "first_id": "msg_2",
                "last_id": "msg_2",
                "has_more": false
            })),
        }
    }

    /// Serves a fake agent service under `/api/projects/demo` and returns a
    /// client pointed at it.
    async fn spawn_fake(run_statuses: Vec<&'static str>) -> (AgentsClient, Shared) {
        let state: Shared = Arc::new(Mutex::new(FakeState {
            run_statuses,
            ..Default::default()
        }));

        let project = Router::new()
            .route("/assistants/{id}", get(get_assistant))
            .route("/threads", post(create_thread))
            .route("/threads/{thread_id}/messages", post(create_message).get(list_messages))
            .route("/threads/{thread_id}/runs", post(create_run))
            .route("/threads/{thread_id}/runs/{run_id}", get(get_run))
            .route("/threads/{thread_id}/runs/{run_id}/cancel", post(cancel_run))
            .with_state(state.clone());
        let app = Router::new().nest("/api/projects/demo", project);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let client = AgentsClient::new(
            &format!("http://{addr}/api/projects/demo"),
            AmbientCredential::from_token("test-token"),
        )
        .expect("client")
        .with_poll_interval(Duration::from_millis(5));
        (client, state)
    }

    #[test]
    fn rejects_invalid_endpoint() {
        let err = AgentsClient::new("not a url", AmbientCredential::from_token("t"))
            .err()
            .expect("should fail");
        assert!(matches!(err, AgentServiceError::Endpoint(_)));
    }

    #[test]
    fn url_appends_encoded_segments() {
        let client = AgentsClient::new(
            "https://example.services.ai.azure.com/api/projects/demo/",
            AmbientCredential::from_token("t"),
        )
        .expect("client");
        let url = client.url(&["threads", "a/b", "messages"]).expect("url");
        assert_eq!(
            url.as_str(),
            "https://example.services.ai.azure.com/api/projects/demo/threads/a%2Fb/messages"
        );
    }

    #[tokio::test]
    async fn get_agent_found_and_missing() {
        let (client, _) = spawn_fake(vec!["completed"]).await;

        let agent = client.get_agent("asst_1").await.expect("lookup");
        let agent = agent.expect("agent should exist");
        assert_eq!(agent.id, "asst_1");
        assert_eq!(agent.name.as_deref(), Some("Helper"));

        let missing = client.get_agent("asst_unknown").await.expect("lookup");
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn thread_and_message_calls_send_expected_bodies() {
        let (client, state) = spawn_fake(vec!["completed"]).await;

        let thread = client.create_thread().await.expect("thread");
        assert_eq!(thread.id, "thread_1");

        let msg = client
            .create_message(&thread.id, MessageRole::User, "hello")
            .await
            .expect("message");
        assert_eq!(msg.role, MessageRole::User);

        let state = state.lock().unwrap();
        assert_eq!(state.posted[0], json!({"role": "user", "content": "hello"}));
    }

    #[tokio::test]
    async fn run_is_polled_until_terminal() {
        let (client, state) = spawn_fake(vec!["in_progress", "in_progress", "completed"]).await;

        let run = client
            .create_and_process_run("thread_1", "asst_1")
            .await
            .expect("run");
        assert_eq!(run.status, RunStatus::Completed);

        let state = state.lock().unwrap();
        assert_eq!(state.polls, 3);
        assert_eq!(state.cancels, 0);
        assert_eq!(state.posted[0], json!({"assistant_id": "asst_1"}));
    }

    #[tokio::test]
    async fn run_requiring_action_is_cancelled() {
        let (client, state) = spawn_fake(vec!["requires_action", "cancelled"]).await;

        let run = client
            .create_and_process_run("thread_1", "asst_1")
            .await
            .expect("run");
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(state.lock().unwrap().cancels, 1);
    }

    #[tokio::test]
    async fn list_messages_follows_pagination() {
        let (client, _) = spawn_fake(vec!["completed"]).await;

        let messages = client.list_messages("thread_1").await.expect("list");
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["msg_1", "msg_2"]);
    }

    #[tokio::test]
    async fn server_error_surfaces_status_and_body() {
        let app = Router::new().fallback(|| async {
            (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        let client = AgentsClient::new(
            &format!("http://{addr}/api/projects/demo"),
            AmbientCredential::from_token("t"),
        )
        .expect("client");

        match client.create_thread().await {
            Err(AgentServiceError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }
}
