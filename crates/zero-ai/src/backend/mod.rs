//! Generation backend abstraction.
//!
//! A backend opens one streaming completion per call and yields
//! [`Increment`]s: plain content or fragments of a function call. The
//! orchestrator never sees a transport; it only sees this trait.

pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use serde::{Deserialize, Serialize};
use zero_config::LlmConfig;

use crate::error::BackendError;
use crate::tools::ToolDescriptor;
use crate::{Message, Role};

/// One unit of backend output.
#[derive(Debug, Clone, PartialEq)]
pub enum Increment {
    Content(String),
    /// Partial function call. `name` usually arrives once, first; `arguments`
    /// arrive as consecutive fragments of a JSON object.
    FunctionCall {
        name: Option<String>,
        arguments: Option<String>,
    },
}

impl Increment {
    pub fn text(text: impl Into<String>) -> Self {
        Increment::Content(text.into())
    }

    pub fn function_name(name: impl Into<String>) -> Self {
        Increment::FunctionCall {
            name: Some(name.into()),
            arguments: None,
        }
    }

    pub fn arguments(fragment: impl Into<String>) -> Self {
        Increment::FunctionCall {
            name: None,
            arguments: Some(fragment.into()),
        }
    }
}

pub type IncrementStream = BoxStream<'static, Result<Increment, BackendError>>;

/// Whether, and which, function the model may call this round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FunctionCallMode {
    Auto,
    None,
    Force(String),
}

/// Assistant-side function call echoed back into the context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCallEcho {
    pub name: String,
    /// JSON-encoded arguments.
    pub arguments: String,
}

/// Context entry as sent to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallEcho>,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            function_call: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

impl From<&Message> for PromptMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: message.content.clone(),
            name: message.name.clone(),
            function_call: None,
        }
    }
}

/// Everything needed to open one generation stream.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub model: String,
    pub messages: Vec<PromptMessage>,
    pub temperature: f64,
    pub top_p: f64,
    pub max_tokens: Option<u32>,
    pub timeout: Duration,
    pub functions: Vec<ToolDescriptor>,
    pub function_call: FunctionCallMode,
}

impl GenerationRequest {
    pub fn new(config: &LlmConfig, messages: Vec<PromptMessage>) -> Self {
        Self {
            model: config.model.clone(),
            messages,
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
            functions: Vec::new(),
            function_call: FunctionCallMode::None,
        }
    }

    /// Offer `functions` to the model. An empty list always means `None`.
    pub fn with_functions(
        mut self,
        functions: Vec<ToolDescriptor>,
        mode: FunctionCallMode,
    ) -> Self {
        if functions.is_empty() || mode == FunctionCallMode::None {
            self.functions = Vec::new();
            self.function_call = FunctionCallMode::None;
        } else {
            self.functions = functions;
            self.function_call = mode;
        }
        self
    }
}

/// A text-generation service.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Open a streaming completion. Errors before the first increment are
    /// returned here; later failures arrive as stream items.
    async fn stream(&self, request: &GenerationRequest) -> Result<IncrementStream, BackendError>;
}

/// Builds a backend for a session's configuration.
pub trait BackendFactory: Send + Sync {
    fn create(&self, config: &LlmConfig) -> Result<Arc<dyn ChatBackend>, BackendError>;
}
