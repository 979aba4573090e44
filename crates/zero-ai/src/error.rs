//! Error types for decoding, tools, backends, and turns.

use zero_common::SessionId;

/// Boxed error returned by tool handlers.
pub type ToolFailure = Box<dyn std::error::Error + Send + Sync>;

/// Function-call fragments that never formed a usable request.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("function-call arguments exceeded {limit} bytes without forming a JSON object")]
    BufferOverflow { limit: usize },
    #[error("stream ended inside call to `{name}` with {buffered} bytes of unparsed arguments")]
    Unterminated { name: String, buffered: usize },
    #[error("arguments for `{name}` are valid JSON but not an object")]
    NotAnObject { name: String },
    #[error("function-call arguments arrived without a function name")]
    MissingName,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid tool `{name}`: {reason}")]
    InvalidTool { name: String, reason: String },
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("tool `{name}` failed: {source}")]
    Execution {
        name: String,
        #[source]
        source: ToolFailure,
    },
    #[error("tool `{name}` panicked")]
    Panicked { name: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("Rate limited")]
    RateLimited,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Timeout")]
    Timeout,
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Backend misconfigured: {0}")]
    Config(String),
}

impl BackendError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            BackendError::RateLimited | BackendError::Network(_) | BackendError::Timeout => true,
            BackendError::Api { status, .. } => *status == 408 || *status >= 500,
            BackendError::Parse(_) | BackendError::Config(_) => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout
        } else {
            BackendError::Network(err.to_string())
        }
    }
}

/// Why a turn could not be accepted or did not finish.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("backend still failing after {attempts} attempts: {last}")]
    RetryExhausted { attempts: u32, last: BackendError },
    #[error("model kept requesting tools after {0} tool rounds")]
    ToolRoundLimit(u32),
    #[error("session {0} is busy with another turn")]
    SessionBusy(SessionId),
    #[error("step stream closed by the client")]
    ChannelClosed,
}
