//! Turn orchestration.
//!
//! [`ChatAgent::chat`] accepts one user message, takes the session for the
//! duration of the turn, and returns a [`TurnStream`] of thinking steps.
//! The turn itself runs on its own task:
//!
//! ```text
//! Idle -> AwaitingModel -> StreamingText -> (AwaitingTool -> AwaitingModel)* -> Idle
//!                 \______________\________________\___________________________-> Failed
//! ```
//!
//! Dropping the stream cancels the turn at its next suspension point; a
//! tool that already started still runs to completion in the background.

mod turn;

#[cfg(test)]
mod tests;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::Stream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info_span, Instrument};
use zero_common::{new_correlation_id, SessionId};
use zero_config::{AgentConfig, ZeroConfig};

use crate::backend::BackendFactory;
use crate::error::AgentError;
use crate::retry::RetryPolicy;
use crate::session::SessionStore;
use crate::steps::ThinkingStep;
use crate::tools::{ToolExecutionBridge, ToolRegistry};
use crate::{Message, ToolCall};

use turn::Turn;

/// Where a turn is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    AwaitingModel,
    StreamingText,
    AwaitingTool,
    Failed,
    /// The client stopped reading before the turn finished.
    Cancelled,
}

/// Final outcome of one turn.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub session_id: SessionId,
    pub state: TurnState,
    /// The persisted assistant message, on success.
    pub assistant: Option<Message>,
    pub tool_calls: Vec<ToolCall>,
    pub error: Option<String>,
}

impl TurnReport {
    pub fn is_success(&self) -> bool {
        self.state == TurnState::Idle
    }
}

pub(crate) struct AgentShared {
    pub(crate) store: Arc<SessionStore>,
    pub(crate) bridge: ToolExecutionBridge,
    pub(crate) config: AgentConfig,
    pub(crate) retry: RetryPolicy,
}

/// Entry point for chat turns. Cheap to clone.
#[derive(Clone)]
pub struct ChatAgent {
    shared: Arc<AgentShared>,
}

impl ChatAgent {
    pub fn new(
        store: Arc<SessionStore>,
        registry: Arc<ToolRegistry>,
        config: AgentConfig,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            shared: Arc::new(AgentShared {
                store,
                bridge: ToolExecutionBridge::new(registry),
                config,
                retry,
            }),
        }
    }

    /// Wire an agent from the loaded configuration.
    pub fn from_config(
        config: &ZeroConfig,
        factory: Arc<dyn BackendFactory>,
        registry: Arc<ToolRegistry>,
    ) -> Self {
        let store = Arc::new(SessionStore::new(factory, config.llm.clone()));
        Self::new(
            store,
            registry,
            config.agent.clone(),
            RetryPolicy::from(&config.retry),
        )
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.shared.store
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        self.shared.bridge.registry()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.shared.config
    }

    /// Start a turn.
    ///
    /// The user message is appended to history before this returns. Under
    /// the `queue` busy policy this waits for any turn already running on
    /// the session; under `reject` it fails with [`AgentError::SessionBusy`].
    pub async fn chat(
        &self,
        session_id: &SessionId,
        content: impl Into<String>,
    ) -> Result<TurnStream, AgentError> {
        let handle = self.shared.store.get_or_create(session_id, None).await?;
        let mut session = handle.begin_turn(self.shared.config.busy_policy).await?;
        session.push(Message::user(session_id.clone(), content));

        let capacity = (self.shared.config.step_channel_capacity as usize).max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let span = info_span!("turn", session_id = %session_id, turn = %new_correlation_id());
        let turn = Turn::new(session, tx, Arc::clone(&self.shared));
        let task = tokio::spawn(turn.run().instrument(span));

        Ok(TurnStream {
            session_id: session_id.clone(),
            rx,
            task,
        })
    }
}

/// Ordered thinking steps of one turn. Ends when the turn does.
pub struct TurnStream {
    session_id: SessionId,
    rx: mpsc::Receiver<ThinkingStep>,
    task: JoinHandle<TurnReport>,
}

impl TurnStream {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub async fn next_step(&mut self) -> Option<ThinkingStep> {
        self.rx.recv().await
    }

    /// Drain every remaining step, then wait for the turn's report.
    pub async fn collect_steps(mut self) -> (Vec<ThinkingStep>, TurnReport) {
        let mut steps = Vec::new();
        while let Some(step) = self.rx.recv().await {
            steps.push(step);
        }
        let report = match self.task.await {
            Ok(report) => report,
            Err(e) => TurnReport {
                session_id: self.session_id,
                state: TurnState::Failed,
                assistant: None,
                tool_calls: Vec::new(),
                error: Some(format!("turn task aborted: {e}")),
            },
        };
        (steps, report)
    }

    pub async fn finish(self) -> TurnReport {
        self.collect_steps().await.1
    }
}

impl Stream for TurnStream {
    type Item = ThinkingStep;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
