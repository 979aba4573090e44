//! Chat Completions client struct, request building, and chunk parsing.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, warn};
use zero_config::LlmConfig;

use crate::backend::{BackendFactory, ChatBackend, FunctionCallMode, GenerationRequest, Increment};
use crate::error::BackendError;

/// Chat Completions client bound to one [`LlmConfig`].
pub struct OpenAiBackend {
    pub(crate) config: LlmConfig,
    pub(crate) http: reqwest::Client,
}

impl fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("config", &self.config)
            .finish()
    }
}

impl OpenAiBackend {
    pub fn new(config: LlmConfig) -> Result<Self, BackendError> {
        if config.api_base.trim().is_empty() {
            return Err(BackendError::Config("llm.api_base is empty".into()));
        }
        if config.api_key.is_empty() {
            warn!(api_base = %config.api_base, "No API key configured; requests are unauthenticated");
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| BackendError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub(crate) fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }

    /// Build the JSON request body for a streaming completion.
    pub(crate) fn build_request_body(&self, request: &GenerationRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "messages": request.messages,
            "temperature": request.temperature,
            "top_p": request.top_p,
            "stream": true,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if !request.functions.is_empty() {
            body["functions"] = json!(request.functions);
            body["function_call"] = match &request.function_call {
                FunctionCallMode::Auto => json!("auto"),
                FunctionCallMode::None => json!("none"),
                FunctionCallMode::Force(name) => json!({ "name": name }),
            };
        }

        body
    }
}

/// Parse one streamed chunk into increments.
///
/// Accepts both the legacy `delta.function_call` shape and the newer
/// `delta.tool_calls[].function` shape; either becomes
/// [`Increment::FunctionCall`].
pub(crate) fn parse_chunk(data: &str) -> Result<Vec<Increment>, BackendError> {
    let json: Value =
        serde_json::from_str(data).map_err(|e| BackendError::Parse(e.to_string()))?;

    if let Some(error) = json.get("error") {
        let message = error["message"]
            .as_str()
            .unwrap_or("unknown streaming error")
            .to_string();
        return Err(BackendError::Api {
            status: 500,
            message,
        });
    }

    let mut increments = Vec::new();
    let Some(choices) = json["choices"].as_array() else {
        return Ok(increments);
    };

    for choice in choices {
        let delta = &choice["delta"];

        if let Some(text) = delta["content"].as_str() {
            if !text.is_empty() {
                increments.push(Increment::Content(text.to_string()));
            }
        }

        if delta["function_call"].is_object() {
            increments.push(function_fragment(&delta["function_call"]));
        }

        // One call per round: parallel calls beyond the first are not run.
        if let Some(calls) = delta["tool_calls"].as_array() {
            for call in calls {
                match call["index"].as_u64().unwrap_or(0) {
                    0 => increments.push(function_fragment(&call["function"])),
                    index => debug!(index, "Ignoring parallel tool call fragment"),
                }
            }
        }
    }

    Ok(increments)
}

fn function_fragment(function: &Value) -> Increment {
    Increment::FunctionCall {
        name: function["name"].as_str().map(String::from),
        arguments: function["arguments"].as_str().map(String::from),
    }
}

/// Creates an [`OpenAiBackend`] per session config.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiFactory;

impl BackendFactory for OpenAiFactory {
    fn create(&self, config: &LlmConfig) -> Result<Arc<dyn ChatBackend>, BackendError> {
        let backend: Arc<dyn ChatBackend> = Arc::new(OpenAiBackend::new(config.clone())?);
        Ok(backend)
    }
}
