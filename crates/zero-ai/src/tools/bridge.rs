//! Runs decoded tool requests and records their outcome.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use zero_common::SessionId;

use super::{stringify, ToolRegistry};
use crate::decoder::ToolRequest;
use crate::error::ToolError;
use crate::{Message, ToolCall};

/// Settled tool call plus the function message to feed back to the model.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub call: ToolCall,
    pub message: Message,
}

/// A tool invocation that has been started but not yet awaited.
///
/// The work runs on its own task. Dropping this value detaches the task, so
/// a started tool always runs to completion even if the turn goes away.
pub struct PendingTool {
    call: ToolCall,
    session_id: SessionId,
    task: JoinHandle<Result<Value, ToolError>>,
}

impl PendingTool {
    /// The `Pending` record created when the tool was started.
    pub fn call(&self) -> &ToolCall {
        &self.call
    }

    pub async fn finish(self) -> ToolOutcome {
        let PendingTool {
            mut call,
            session_id,
            task,
        } = self;
        let name = call.tool_name.clone();

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolError::Panicked { name: name.clone() }),
        };

        let content = match outcome {
            Ok(value) => {
                info!(tool = %name, "Tool completed");
                call.complete(stringify(&value));
                value.to_string()
            }
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool failed");
                let text = e.to_string();
                call.fail(text.clone());
                json!({ "error": text }).to_string()
            }
        };

        let message = Message::function(session_id, name, content);
        ToolOutcome { call, message }
    }
}

/// Turns a [`ToolRequest`] into a settled [`ToolCall`] record.
#[derive(Clone)]
pub struct ToolExecutionBridge {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutionBridge {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Start a tool. `message_id` is the assistant message the call belongs to.
    pub fn spawn(&self, session_id: &SessionId, message_id: &str, request: ToolRequest) -> PendingTool {
        let ToolRequest { name, args } = request;
        let call = ToolCall::pending(message_id, name.clone(), args.clone());
        info!(tool = %name, call_id = %call.id, "Executing tool");

        let registry = Arc::clone(&self.registry);
        let task = tokio::spawn(async move { registry.run(&name, args).await });

        PendingTool {
            call,
            session_id: session_id.clone(),
            task,
        }
    }

    pub async fn execute(
        &self,
        session_id: &SessionId,
        message_id: &str,
        request: ToolRequest,
    ) -> ToolOutcome {
        self.spawn(session_id, message_id, request).finish().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolDescriptor;
    use crate::{Role, ToolCallStatus};

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry
            .register_blocking_fn(
                ToolDescriptor::new("lookup", "Look things up", json!({"type": "object"})),
                |args| Ok(json!([{ "title": "hit", "query": args.get("query").cloned() }])),
            )
            .unwrap();
        registry
            .register_fn(
                ToolDescriptor::new("greet", "Say hello", json!({"type": "object"})),
                |_| async { Ok(json!("hello")) },
            )
            .unwrap();
        registry
            .register_blocking_fn(
                ToolDescriptor::new("broken", "Always fails", json!({"type": "object"})),
                |_| Err("upstream unavailable".into()),
            )
            .unwrap();
        Arc::new(registry)
    }

    fn request(name: &str, args: Value) -> ToolRequest {
        ToolRequest {
            name: name.into(),
            args: args.as_object().cloned().unwrap_or_default(),
        }
    }

    #[tokio::test]
    async fn success_records_result_and_function_message() {
        let bridge = ToolExecutionBridge::new(registry());
        let sid = SessionId::from("s1");
        let pending = bridge.spawn(&sid, "msg-1", request("lookup", json!({"query": "rust"})));
        assert_eq!(pending.call().status(), ToolCallStatus::Pending);
        assert_eq!(pending.call().message_id, "msg-1");

        let outcome = pending.finish().await;
        assert_eq!(outcome.call.status(), ToolCallStatus::Completed);
        assert_eq!(outcome.call.parameters["query"], "rust");

        assert_eq!(outcome.message.role, Role::Function);
        assert_eq!(outcome.message.name.as_deref(), Some("lookup"));
        let content: Value = serde_json::from_str(&outcome.message.content).unwrap();
        assert_eq!(content[0]["title"], "hit");
    }

    #[tokio::test]
    async fn string_result_is_stored_verbatim() {
        let bridge = ToolExecutionBridge::new(registry());
        let outcome = bridge
            .execute(&SessionId::from("s1"), "m", request("greet", json!({})))
            .await;
        assert_eq!(outcome.call.result(), Some("hello"));
        assert_eq!(outcome.message.content, "\"hello\"");
    }

    #[tokio::test]
    async fn failure_is_recorded_not_raised() {
        let bridge = ToolExecutionBridge::new(registry());
        let outcome = bridge
            .execute(&SessionId::from("s1"), "m", request("broken", json!({})))
            .await;
        assert_eq!(outcome.call.status(), ToolCallStatus::Failed);
        assert!(outcome.call.result().unwrap().contains("upstream unavailable"));

        let content: Value = serde_json::from_str(&outcome.message.content).unwrap();
        assert!(content["error"].as_str().unwrap().contains("upstream unavailable"));
    }

    #[tokio::test]
    async fn unknown_tool_fails_the_call() {
        let bridge = ToolExecutionBridge::new(registry());
        let outcome = bridge
            .execute(&SessionId::from("s1"), "m", request("nope", json!({})))
            .await;
        assert_eq!(outcome.call.status(), ToolCallStatus::Failed);
        assert_eq!(outcome.call.result(), Some("tool not found: nope"));
    }
}
