//! Session handles and the per-turn guard.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use zero_common::SessionId;
use zero_config::BusyPolicy;

use super::manager::ConversationSession;
use crate::error::AgentError;
use crate::Message;

/// Shared reference to one session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    inner: Arc<Mutex<ConversationSession>>,
}

impl SessionHandle {
    pub(crate) fn new(session: ConversationSession) -> Self {
        Self {
            id: session.id().clone(),
            inner: Arc::new(Mutex::new(session)),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Whether both handles refer to the same session instance.
    pub fn same_session(&self, other: &SessionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether a turn currently holds this session.
    pub fn is_busy(&self) -> bool {
        self.inner.try_lock().is_err()
    }

    /// Wait for exclusive access. Waiters are served in arrival order.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, ConversationSession> {
        self.inner.lock().await
    }

    pub async fn history(&self) -> Vec<Message> {
        self.inner.lock().await.history().to_vec()
    }

    /// Acquire the session for one turn according to `policy`.
    pub(crate) async fn begin_turn(&self, policy: BusyPolicy) -> Result<TurnGuard, AgentError> {
        let guard = match policy {
            BusyPolicy::Queue => Arc::clone(&self.inner).lock_owned().await,
            BusyPolicy::Reject => Arc::clone(&self.inner)
                .try_lock_owned()
                .map_err(|_| AgentError::SessionBusy(self.id.clone()))?,
        };
        Ok(TurnGuard { guard })
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle").field("id", &self.id).finish()
    }
}

/// Exclusive access to a session for the lifetime of one turn.
///
/// Released on drop, including when the turn task is cancelled or panics.
pub struct TurnGuard {
    guard: OwnedMutexGuard<ConversationSession>,
}

impl std::fmt::Debug for TurnGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnGuard").field("id", self.guard.id()).finish()
    }
}

impl Deref for TurnGuard {
    type Target = ConversationSession;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl DerefMut for TurnGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}
