//! Configuration schema types for zero.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with the same defaults the service ships with.

mod agent;
mod llm;
mod system;

pub use agent::*;
pub use llm::*;
pub use system::*;

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ZeroConfig {
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub agent: AgentConfig,
    pub tools: ToolsConfig,
    pub logging: LoggingConfig,
}
