//! Conversation session state.

use std::sync::Arc;

use tracing::debug;
use zero_common::SessionId;
use zero_config::LlmConfig;

use crate::backend::{ChatBackend, PromptMessage};
use crate::Message;

/// One conversation: its backend binding and ordered history.
pub struct ConversationSession {
    id: SessionId,
    config: LlmConfig,
    backend: Arc<dyn ChatBackend>,
    history: Vec<Message>,
}

impl ConversationSession {
    pub fn new(id: SessionId, config: LlmConfig, backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            id,
            config,
            backend,
            history: Vec::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    pub fn backend(&self) -> Arc<dyn ChatBackend> {
        Arc::clone(&self.backend)
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn push(&mut self, message: Message) {
        debug!(session_id = %self.id, role = ?message.role, "Appending message");
        self.history.push(message);
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Rebind to a new backend. History is kept.
    pub fn rebind(&mut self, config: LlmConfig, backend: Arc<dyn ChatBackend>) {
        self.config = config;
        self.backend = backend;
    }

    /// System prompt followed by the full history.
    pub fn build_context(&self, system_prompt: &str) -> Vec<PromptMessage> {
        let mut msgs = Vec::with_capacity(self.history.len() + 1);
        if !system_prompt.is_empty() {
            msgs.push(PromptMessage::system(system_prompt));
        }
        msgs.extend(self.history.iter().map(PromptMessage::from));
        msgs
    }
}

impl std::fmt::Debug for ConversationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationSession")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .field("history_len", &self.history.len())
            .finish()
    }
}
