//! Session registry keyed by session id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use zero_common::SessionId;
use zero_config::LlmConfig;

use super::manager::ConversationSession;
use super::types::SessionHandle;
use crate::backend::BackendFactory;
use crate::error::BackendError;
use crate::Message;

/// Owns every live session. Shared by all turns.
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, SessionHandle>>,
    factory: Arc<dyn BackendFactory>,
    default_config: LlmConfig,
}

impl SessionStore {
    pub fn new(factory: Arc<dyn BackendFactory>, default_config: LlmConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            factory,
            default_config,
        }
    }

    pub fn default_config(&self) -> &LlmConfig {
        &self.default_config
    }

    /// Return the session for `id`, creating it on first use.
    ///
    /// `config` only applies at creation. Asking for an existing session
    /// with a different config returns it unchanged; use
    /// [`update_config`](Self::update_config) to rebind.
    pub async fn get_or_create(
        &self,
        id: &SessionId,
        config: Option<LlmConfig>,
    ) -> Result<SessionHandle, BackendError> {
        if let Some(handle) = self.sessions.read().await.get(id) {
            return Ok(handle.clone());
        }

        let mut sessions = self.sessions.write().await;
        if let Some(handle) = sessions.get(id) {
            return Ok(handle.clone());
        }

        let config = config.unwrap_or_else(|| self.default_config.clone());
        let backend = self.factory.create(&config)?;
        info!(session_id = %id, model = %config.model, backend = backend.name(), "Created session");
        let handle = SessionHandle::new(ConversationSession::new(id.clone(), config, backend));
        sessions.insert(id.clone(), handle.clone());
        Ok(handle)
    }

    pub async fn get(&self, id: &SessionId) -> Option<SessionHandle> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Rebind an existing session to a new config. Waits for any turn in
    /// flight. Returns `false` if the session does not exist.
    pub async fn update_config(&self, id: &SessionId, config: LlmConfig) -> Result<bool, BackendError> {
        let Some(handle) = self.get(id).await else {
            return Ok(false);
        };
        let backend = self.factory.create(&config)?;
        handle.lock().await.rebind(config, backend);
        info!(session_id = %id, "Updated session config");
        Ok(true)
    }

    /// Forget a session. A turn already holding it finishes normally.
    pub async fn remove(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!(session_id = %id, "Removed session");
        }
        removed
    }

    pub async fn append(&self, id: &SessionId, message: Message) -> bool {
        match self.get(id).await {
            Some(handle) => {
                handle.lock().await.push(message);
                true
            }
            None => false,
        }
    }

    /// History in insertion order; empty for unknown sessions.
    pub async fn history(&self, id: &SessionId) -> Vec<Message> {
        match self.get(id).await {
            Some(handle) => handle.history().await,
            None => Vec::new(),
        }
    }

    pub async fn clear(&self, id: &SessionId) -> bool {
        match self.get(id).await {
            Some(handle) => {
                handle.lock().await.clear();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
