//! Tools the model can call.
//!
//! Handlers are registered once at startup into a [`ToolRegistry`], which is
//! then shared read-only. Synchronous handlers run on a bounded blocking
//! pool so they never stall the stream that requested them.

mod bridge;
mod handler;
mod registry;
pub mod search;

pub use bridge::{PendingTool, ToolExecutionBridge, ToolOutcome};
pub use handler::{BlockingFnTool, BlockingTool, FnTool, Tool, ToolArgs, ToolResult};
pub use registry::{ToolRegistry, DEFAULT_BLOCKING_POOL};
pub use search::{register_builtin_tools, DuckDuckGoSearch, SearchResult};

use serde::{Deserialize, Serialize};

/// Name, description and JSON Schema for one tool.
///
/// Serializes to the function shape the Chat Completions API expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Render a result value as the text stored on a tool call record.
pub(crate) fn stringify(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
