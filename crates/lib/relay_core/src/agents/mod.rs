//! Agent service module — the hosted agent runtime the relay talks to.
//!
//! The relay never executes agents itself. Agents, threads, messages and
//! runs all live in the remote service; this module only describes that
//! service ([`AgentService`]) and provides ways to reach it.
//!
//! # Implementations
//!
//! - [`client::AgentsClient`] — HTTPS client for an Azure AI Foundry project
//!   endpoint, authenticated through [`credential::AmbientCredential`]
//! - `memory::InMemoryAgentService` — in-process double for tests
//!   (`test-util` feature)

pub mod client;
pub mod credential;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod models;

use async_trait::async_trait;
use thiserror::Error;

pub use models::{
    Agent, AgentThread, MessageContent, MessageRole, MessageText, RunError, RunStatus,
    ThreadMessage, ThreadRun,
};

use credential::CredentialError;

/// Errors raised while talking to the agent service.
#[derive(Debug, Error)]
pub enum AgentServiceError {
    #[error("Agent service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Agent service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Agent service response could not be decoded: {0}")]
    Decode(String),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Invalid agent service endpoint: {0}")]
    Endpoint(String),
}

/// Result type for agent service operations.
pub type Result<T> = std::result::Result<T, AgentServiceError>;

/// Operations the relay needs from the hosted agent service.
///
/// Every call is a remote round trip. Implementations hold no per-request
/// state; the service is the source of truth for threads and messages.
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Look up an agent by id. Returns `Ok(None)` when the service does not
    /// know the id.
    async fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>>;

    /// Create an empty conversation thread.
    async fn create_thread(&self) -> Result<AgentThread>;

    /// Append a message to a thread.
    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage>;

    /// Start a run of `agent_id` on `thread_id` and wait until it settles.
    async fn create_and_process_run(&self, thread_id: &str, agent_id: &str) -> Result<ThreadRun>;

    /// All messages of a thread, oldest first.
    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>>;
}
