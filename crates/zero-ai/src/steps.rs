//! Thinking steps and their wire framing.
//!
//! A turn is delivered as an ordered sequence of [`ThinkingStep`]s. The
//! transport frames each step as one JSON document, either newline-delimited
//! or as a Server-Sent Events `data:` record.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Thinking,
    ToolCall,
}

/// One user-visible step of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingStep {
    #[serde(rename = "type")]
    pub kind: StepKind,
    pub content: String,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_args: Option<Map<String, Value>>,
    #[serde(default)]
    pub tool_result: Option<String>,
}

impl ThinkingStep {
    pub fn thinking(content: impl Into<String>) -> Self {
        Self {
            kind: StepKind::Thinking,
            content: content.into(),
            tool_name: None,
            tool_args: None,
            tool_result: None,
        }
    }

    /// Announcement that a tool is about to run.
    pub fn tool_call(name: impl Into<String>, args: Map<String, Value>) -> Self {
        let name = name.into();
        Self {
            kind: StepKind::ToolCall,
            content: format!("Calling tool: {name}"),
            tool_name: Some(name),
            tool_args: Some(args),
            tool_result: None,
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self::thinking(format!("Error: {message}"))
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.tool_result = Some(result.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireFormat {
    /// One JSON document per line.
    #[default]
    Ndjson,
    /// `data: {json}` followed by a blank line.
    Sse,
}

impl std::str::FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ndjson" | "jsonl" => Ok(WireFormat::Ndjson),
            "sse" => Ok(WireFormat::Sse),
            other => Err(format!("unknown wire format `{other}` (expected ndjson or sse)")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StepEncoder {
    format: WireFormat,
}

impl StepEncoder {
    pub fn new(format: WireFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> WireFormat {
        self.format
    }

    /// Frame one step. Every frame is self-delimiting.
    pub fn encode(&self, step: &ThinkingStep) -> Result<String, serde_json::Error> {
        let json = serde_json::to_string(step)?;
        Ok(match self.format {
            WireFormat::Ndjson => format!("{json}\n"),
            WireFormat::Sse => format!("data: {json}\n\n"),
        })
    }

    /// Write one step and flush, so the consumer sees it immediately.
    pub async fn write_step<W>(&self, writer: &mut W, step: &ThinkingStep) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = self.encode(step).map_err(std::io::Error::other)?;
        writer.write_all(frame.as_bytes()).await?;
        writer.flush().await
    }
}
