//! Streaming chat engine for zero.
//!
//! Turns one user message into an ordered stream of thinking steps:
//! - Incremental decoding of text and function-call fragments
//! - Tool registry with async and blocking handlers
//! - Per-session history with one turn in flight at a time
//! - Bounded retry of transient backend failures
//! - NDJSON and SSE framing of the step stream

pub mod agent;
pub mod backend;
pub mod decoder;
pub mod error;
pub mod mock;
pub mod prompt;
pub mod retry;
pub mod session;
pub mod steps;
pub mod streaming;
pub mod tools;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zero_common::{new_id, SessionId};

pub use agent::{ChatAgent, TurnReport, TurnState, TurnStream};
pub use backend::openai::{OpenAiBackend, OpenAiFactory};
pub use backend::{BackendFactory, ChatBackend, FunctionCallMode, GenerationRequest, Increment};
pub use decoder::{DecodedEvent, StreamDecoder, ToolRequest};
pub use error::{AgentError, BackendError, DecodeError, ToolError};
pub use prompt::{PromptManager, Task};
pub use retry::RetryPolicy;
pub use session::{ConversationSession, SessionHandle, SessionStore};
pub use steps::{StepEncoder, StepKind, ThinkingStep, WireFormat};
pub use tools::{
    register_builtin_tools, BlockingTool, Tool, ToolDescriptor, ToolExecutionBridge, ToolRegistry,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    /// Result of a tool execution, fed back to the model.
    Function,
}

/// One entry of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub session_id: SessionId,
    pub role: Role,
    pub content: String,
    /// Tool name, set on `Function` messages only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool executions performed while producing an assistant message.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(session_id: SessionId, role: Role, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            session_id,
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn user(session_id: SessionId, content: impl Into<String>) -> Self {
        Self::new(session_id, Role::User, content)
    }

    pub fn function(
        session_id: SessionId,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut message = Self::new(session_id, Role::Function, content);
        message.name = Some(name.into());
        message
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Pending,
    Completed,
    Failed,
}

/// Record of one tool execution.
///
/// Created `Pending`; moves to `Completed` or `Failed` exactly once, and the
/// result text is written in the same step as the terminal status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    /// Assistant message this call belongs to.
    pub message_id: String,
    pub tool_name: String,
    pub parameters: serde_json::Map<String, serde_json::Value>,
    result: Option<String>,
    status: ToolCallStatus,
    pub created_at: DateTime<Utc>,
}

impl ToolCall {
    pub fn pending(
        message_id: impl Into<String>,
        tool_name: impl Into<String>,
        parameters: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            id: new_id(),
            message_id: message_id.into(),
            tool_name: tool_name.into(),
            parameters,
            result: None,
            status: ToolCallStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn status(&self) -> ToolCallStatus {
        self.status
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status != ToolCallStatus::Pending
    }

    /// Mark the call completed. Returns `false` if it was already terminal.
    pub fn complete(&mut self, result: impl Into<String>) -> bool {
        self.settle(ToolCallStatus::Completed, result.into())
    }

    /// Mark the call failed. Returns `false` if it was already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        self.settle(ToolCallStatus::Failed, error.into())
    }

    fn settle(&mut self, status: ToolCallStatus, text: String) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.result = Some(text);
        self.status = status;
        true
    }
}
