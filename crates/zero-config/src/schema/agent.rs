//! Orchestrator and tool configuration types.

use serde::{Deserialize, Serialize};

/// Persona the assistant adopts; selects the role prompt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum AgentRole {
    #[default]
    Assistant,
    Searcher,
    Analyzer,
    Planner,
}

/// How the backend is allowed to request function calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum FunctionCallPolicy {
    #[default]
    Auto,
    None,
    /// Force `force_tool` on the first generation round of every turn.
    Force,
}

/// What happens when a turn arrives for a session that is mid-turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum BusyPolicy {
    #[default]
    Queue,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub role: AgentRole,
    pub function_call: FunctionCallPolicy,
    pub force_tool: String,
    /// Tool executions allowed per turn before function calling is switched off (1-20).
    pub max_tool_rounds: u32,
    /// Largest function-call argument buffer the decoder will hold, in bytes.
    pub max_argument_bytes: u32,
    pub busy_policy: BusyPolicy,
    pub step_channel_capacity: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            role: AgentRole::Assistant,
            function_call: FunctionCallPolicy::Auto,
            force_tool: "search_duckduckgo".to_string(),
            max_tool_rounds: 5,
            max_argument_bytes: 64 * 1024,
            busy_policy: BusyPolicy::Queue,
            step_channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Worker threads available to synchronous tool handlers (1-64).
    pub blocking_pool_size: u32,
    pub search_max_results: u32,
    pub search_endpoint: String,
    pub search_timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            blocking_pool_size: 4,
            search_max_results: 5,
            search_endpoint: "https://api.duckduckgo.com/".to_string(),
            search_timeout_secs: 15,
        }
    }
}
