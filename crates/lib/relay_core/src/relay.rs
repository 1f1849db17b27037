//! Relay orchestration — one user message in, one agent reply out.
//!
//! Sequence against the agent service:
//! 1. Resolve the agent
//! 2. Create a thread unless the caller supplied one
//! 3. Post the user message
//! 4. Run the agent on the thread and wait for it to settle
//! 5. List the thread and pick the latest assistant message
//!
//! Nothing is rolled back on failure: a thread or message created before a
//! failing step stays in the service.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::agents::{AgentService, AgentServiceError, MessageRole, RunStatus, ThreadMessage};

/// Reply text used when the thread holds no assistant message.
pub const NO_ASSISTANT_MESSAGE: &str = "No assistant message found.";

/// Errors from [`relay_message`].
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Agent with ID {0} not found.")]
    AgentNotFound(String),

    #[error(transparent)]
    Service(#[from] AgentServiceError),
}

/// A validated relay request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayInput {
    pub message: String,
    pub agent_id: String,
    pub thread_id: Option<String>,
}

/// The agent's answer plus the thread to continue the conversation on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayReply {
    pub response: String,
    pub thread_id: String,
}

/// Forwards `input` to its agent and returns the agent's latest reply.
pub async fn relay_message(
    agents: &dyn AgentService,
    input: RelayInput,
) -> Result<RelayReply, RelayError> {
    let RelayInput {
        message,
        agent_id,
        thread_id,
    } = input;

    let agent = agents
        .get_agent(&agent_id)
        .await?
        .ok_or_else(|| RelayError::AgentNotFound(agent_id.clone()))?;

    let thread_id = match thread_id {
        Some(id) => id,
        None => {
            let thread = agents.create_thread().await?;
            info!(thread_id = %thread.id, agent_id = %agent.id, "created thread");
            thread.id
        }
    };

    agents
        .create_message(&thread_id, MessageRole::User, &message)
        .await?;

    let run = agents.create_and_process_run(&thread_id, &agent.id).await?;
    if run.status != RunStatus::Completed {
        let reason = run
            .last_error
            .as_ref()
            .and_then(|e| e.message.as_deref())
            .unwrap_or("none reported");
        warn!(
            thread_id = %thread_id,
            run_id = %run.id,
            status = ?run.status,
            reason,
            "run did not complete"
        );
    }

    let messages = agents.list_messages(&thread_id).await?;
    debug!(thread_id = %thread_id, count = messages.len(), "listed thread messages");

    Ok(RelayReply {
        response: assistant_reply_text(&messages),
        thread_id,
    })
}

/// Text of the last assistant message: its text parts joined by a single
/// space, or [`NO_ASSISTANT_MESSAGE`].
pub fn assistant_reply_text(messages: &[ThreadMessage]) -> String {
    let Some(last) = messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::Assistant)
    else {
        return NO_ASSISTANT_MESSAGE.to_string();
    };

    last.content
        .iter()
        .filter_map(|part| part.text.as_ref())
        .map(|text| text.value.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::MessageContent;
    use crate::agents::memory::{InMemoryAgentService, Step};

    fn message(role: MessageRole, parts: Vec<MessageContent>) -> ThreadMessage {
        ThreadMessage {
            id: "msg".into(),
            thread_id: None,
            role,
            content: parts,
        }
    }

    fn input(message: &str, agent_id: &str, thread_id: Option<&str>) -> RelayInput {
        RelayInput {
            message: message.into(),
            agent_id: agent_id.into(),
            thread_id: thread_id.map(Into::into),
        }
    }

    #[test]
    fn reply_text_uses_last_assistant_message() {
        let messages = vec![
            message(MessageRole::Assistant, vec![MessageContent::text("old")]),
            message(MessageRole::User, vec![MessageContent::text("q")]),
            message(MessageRole::Assistant, vec![MessageContent::text("new")]),
            message(MessageRole::User, vec![MessageContent::text("trailing")]),
        ];
        assert_eq!(assistant_reply_text(&messages), "new");
    }

    #[test]
    fn reply_text_joins_text_parts_and_skips_others() {
        let image = MessageContent {
            kind: "image_file".into(),
            text: None,
        };
        let messages = vec![message(
            MessageRole::Assistant,
            vec![
                MessageContent::text("one"),
                image,
                MessageContent::text("two"),
            ],
        )];
        assert_eq!(assistant_reply_text(&messages), "one two");
    }

    #[test]
    fn reply_text_falls_back_without_assistant() {
        let messages = vec![message(MessageRole::User, vec![MessageContent::text("q")])];
        assert_eq!(assistant_reply_text(&messages), NO_ASSISTANT_MESSAGE);
        assert_eq!(assistant_reply_text(&[]), NO_ASSISTANT_MESSAGE);
    }

    #[test]
    fn reply_serializes_with_camel_case_thread_id() {
        let reply = RelayReply {
            response: "hi".into(),
            thread_id: "t1".into(),
        };
        assert_eq!(
            serde_json::to_value(&reply).expect("serialize"),
            serde_json::json!({"response": "hi", "threadId": "t1"})
        );
    }

    #[tokio::test]
    async fn new_conversation_creates_thread() {
        let service = InMemoryAgentService::new()
            .with_agent("A1")
            .with_responder(|_| Some(vec![MessageContent::text("hi")]));

        let reply = relay_message(&service, input("hello", "A1", None))
            .await
            .expect("relay");

        assert_eq!(reply.response, "hi");
        assert_eq!(service.thread_ids(), vec![reply.thread_id.clone()]);
        let posted = service.messages(&reply.thread_id);
        assert_eq!(posted[0].role, MessageRole::User);
        assert_eq!(posted[0].content, vec![MessageContent::text("hello")]);
    }

    #[tokio::test]
    async fn existing_thread_is_reused() {
        let service = InMemoryAgentService::new()
            .with_agent("A1")
            .with_thread("thread_existing");

        let reply = relay_message(&service, input("again", "A1", Some("thread_existing")))
            .await
            .expect("relay");

        assert_eq!(reply.thread_id, "thread_existing");
        assert_eq!(reply.response, "again");
        assert_eq!(service.calls().create_thread, 0);
    }

    #[tokio::test]
    async fn unknown_agent_stops_before_any_side_effect() {
        let service = InMemoryAgentService::new().with_agent("A1");

        let err = relay_message(&service, input("x", "missing", None))
            .await
            .expect_err("should fail");

        assert!(matches!(err, RelayError::AgentNotFound(ref id) if id == "missing"));
        assert_eq!(err.to_string(), "Agent with ID missing not found.");
        assert_eq!(service.calls().create_thread, 0);
        assert_eq!(service.calls().create_message, 0);
    }

    #[tokio::test]
    async fn silent_agent_yields_fallback_text() {
        let service = InMemoryAgentService::new()
            .with_agent("A1")
            .with_responder(|_| None);

        let reply = relay_message(&service, input("hello", "A1", None))
            .await
            .expect("relay");
        assert_eq!(reply.response, NO_ASSISTANT_MESSAGE);
    }

    #[tokio::test]
    async fn failure_mid_sequence_keeps_earlier_side_effects() {
        let service = InMemoryAgentService::new()
            .with_agent("A1")
            .failing_at(Step::Run);

        let err = relay_message(&service, input("hello", "A1", None))
            .await
            .expect_err("should fail");
        assert!(matches!(err, RelayError::Service(_)));

        let threads = service.thread_ids();
        assert_eq!(threads.len(), 1);
        assert_eq!(service.messages(&threads[0]).len(), 1);
        assert_eq!(service.calls().list_messages, 0);
    }
}
