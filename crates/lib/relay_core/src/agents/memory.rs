//! In-process agent service for tests.
//!
//! Keeps agents, threads and messages in memory. A run appends whatever the
//! configured responder returns for the latest user message. Any step can be
//! made to fail to exercise error paths.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

use super::{
    Agent, AgentService, AgentServiceError, AgentThread, MessageContent, MessageRole, Result,
    RunStatus, ThreadMessage, ThreadRun,
};

/// A step of the relay sequence that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    GetAgent,
    CreateThread,
    CreateMessage,
    Run,
    ListMessages,
}

/// Number of calls made to each operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get_agent: usize,
    pub create_thread: usize,
    pub create_message: usize,
    pub runs: usize,
    pub list_messages: usize,
}

type Responder = Box<dyn Fn(&str) -> Option<Vec<MessageContent>> + Send + Sync>;

#[derive(Default)]
struct Store {
    agents: HashMap<String, Agent>,
    threads: HashMap<String, Vec<ThreadMessage>>,
    failing: Option<Step>,
    calls: CallCounts,
}

/// In-memory [`AgentService`].
pub struct InMemoryAgentService {
    store: Mutex<Store>,
    responder: Responder,
}

impl Default for InMemoryAgentService {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAgentService {
    /// Empty service whose agents echo the user message back.
    pub fn new() -> Self {
        Self {
            store: Mutex::new(Store::default()),
            responder: Box::new(|message| Some(vec![MessageContent::text(message)])),
        }
    }

    /// Registers an agent.
    pub fn with_agent(self, agent_id: &str) -> Self {
        self.lock().agents.insert(
            agent_id.to_string(),
            Agent {
                id: agent_id.to_string(),
                name: None,
                model: None,
            },
        );
        self
    }

    /// Registers an existing, empty thread.
    pub fn with_thread(self, thread_id: &str) -> Self {
        self.lock().threads.insert(thread_id.to_string(), Vec::new());
        self
    }

    /// Replaces how agents answer. Returning `None` makes a run produce no
    /// assistant message.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&str) -> Option<Vec<MessageContent>> + Send + Sync + 'static,
    {
        self.responder = Box::new(responder);
        self
    }

    /// Makes every call to `step` fail with a 500 status error.
    pub fn failing_at(self, step: Step) -> Self {
        self.lock().failing = Some(step);
        self
    }

    /// Ids of all threads, in no particular order.
    pub fn thread_ids(&self) -> Vec<String> {
        self.lock().threads.keys().cloned().collect()
    }

    /// Messages of a thread, oldest first.
    pub fn messages(&self, thread_id: &str) -> Vec<ThreadMessage> {
        self.lock()
            .threads
            .get(thread_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Call counters.
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store {
    fn check(&self, step: Step) -> Result<()> {
        if self.failing == Some(step) {
            return Err(AgentServiceError::Status {
                status: 500,
                body: format!("injected failure at {step:?}"),
            });
        }
        Ok(())
    }

    fn thread_mut(&mut self, thread_id: &str) -> Result<&mut Vec<ThreadMessage>> {
        self.threads
            .get_mut(thread_id)
            .ok_or_else(|| AgentServiceError::Status {
                status: 404,
                body: format!("No thread found with id '{thread_id}'"),
            })
    }
}

fn new_message(thread_id: &str, role: MessageRole, content: Vec<MessageContent>) -> ThreadMessage {
    ThreadMessage {
        id: format!("msg_{}", Uuid::new_v4().simple()),
        thread_id: Some(thread_id.to_string()),
        role,
        content,
    }
}

#[async_trait]
impl AgentService for InMemoryAgentService {
    async fn get_agent(&self, agent_id: &str) -> Result<Option<Agent>> {
        let mut store = self.lock();
        store.calls.get_agent += 1;
        store.check(Step::GetAgent)?;
        Ok(store.agents.get(agent_id).cloned())
    }

    async fn create_thread(&self) -> Result<AgentThread> {
        let mut store = self.lock();
        store.calls.create_thread += 1;
        store.check(Step::CreateThread)?;
        let id = format!("thread_{}", Uuid::new_v4().simple());
        store.threads.insert(id.clone(), Vec::new());
        Ok(AgentThread { id })
    }

    async fn create_message(
        &self,
        thread_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadMessage> {
        let mut store = self.lock();
        store.calls.create_message += 1;
        store.check(Step::CreateMessage)?;
        let message = new_message(thread_id, role, vec![MessageContent::text(content)]);
        store.thread_mut(thread_id)?.push(message.clone());
        Ok(message)
    }

    async fn create_and_process_run(&self, thread_id: &str, agent_id: &str) -> Result<ThreadRun> {
        let mut store = self.lock();
        store.calls.runs += 1;
        store.check(Step::Run)?;
        if !store.agents.contains_key(agent_id) {
            return Err(AgentServiceError::Status {
                status: 404,
                body: format!("No assistant found with id '{agent_id}'"),
            });
        }

        let thread = store.thread_mut(thread_id)?;
        let prompt = thread
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .and_then(|m| m.content.iter().find_map(|c| c.text.as_ref()))
            .map(|t| t.value.clone())
            .unwrap_or_default();

        if let Some(content) = (self.responder)(&prompt) {
            thread.push(new_message(thread_id, MessageRole::Assistant, content));
        }

        Ok(ThreadRun {
            id: format!("run_{}", Uuid::new_v4().simple()),
            thread_id: Some(thread_id.to_string()),
            status: RunStatus::Completed,
            last_error: None,
        })
    }

    async fn list_messages(&self, thread_id: &str) -> Result<Vec<ThreadMessage>> {
        let mut store = self.lock();
        store.calls.list_messages += 1;
        store.check(Step::ListMessages)?;
        Ok(store.thread_mut(thread_id)?.clone())
    }
}
