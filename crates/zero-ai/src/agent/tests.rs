use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use zero_common::SessionId;
use zero_config::{AgentConfig, BusyPolicy, FunctionCallPolicy, LlmConfig};

use super::*;
use crate::backend::{FunctionCallMode, Increment};
use crate::error::BackendError;
use crate::mock::{ScriptItem, ScriptedBackend, ScriptedFactory};
use crate::steps::StepKind;
use crate::tools::{ToolDescriptor, ToolRegistry};
use crate::{Role, ToolCallStatus};

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        backoff_multiplier: 2.0,
        jitter: 0.0,
    }
}

fn search_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry
        .register_blocking_fn(
            ToolDescriptor::new(
                "search_duckduckgo",
                "Search the web",
                json!({"type": "object", "properties": {"query": {"type": "string"}}}),
            ),
            |args| {
                let query = args.get("query").and_then(Value::as_str).unwrap_or_default();
                Ok(json!([{ "title": format!("About {query}"), "link": "https://example.com", "snippet": "..." }]))
            },
        )
        .unwrap();
    registry
        .register_blocking_fn(
            ToolDescriptor::new("flaky", "Always fails", json!({"type": "object"})),
            |_| Err("search backend unreachable".into()),
        )
        .unwrap();
    registry
}

fn agent(backend: &Arc<ScriptedBackend>, registry: ToolRegistry, config: AgentConfig) -> ChatAgent {
    let factory = Arc::new(ScriptedFactory::with_backend(Arc::clone(backend)));
    let store = Arc::new(SessionStore::new(factory, LlmConfig::default()));
    ChatAgent::new(store, Arc::new(registry), config, fast_retry())
}

fn contents(steps: &[ThinkingStep]) -> Vec<&str> {
    steps.iter().map(|s| s.content.as_str()).collect()
}

#[tokio::test]
async fn text_only_turn_flushes_lines() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_text(&["Hel", "lo\n", "World"]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());
    let sid = SessionId::from("s1");

    let (steps, report) = agent.chat(&sid, "hi").await.unwrap().collect_steps().await;

    assert_eq!(contents(&steps), vec!["Hello", "World"]);
    assert!(steps.iter().all(|s| s.kind == StepKind::Thinking));
    assert!(report.is_success());

    let history = agent.sessions().history(&sid).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "hi");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Hello\nWorld");
    assert!(history[1].tool_calls.is_empty());
}

#[tokio::test]
async fn blank_lines_are_not_emitted() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_text(&["one\n\n  \n", "two\n"]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());

    let (steps, _) = agent.chat(&SessionId::from("s"), "q").await.unwrap().collect_steps().await;
    assert_eq!(contents(&steps), vec!["one", "two"]);
}

#[tokio::test]
async fn tool_round_trip() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_stream(vec![
            Increment::text("Let me check.\n"),
            Increment::FunctionCall {
                name: Some("search_duckduckgo".into()),
                arguments: Some("{\"query\": \"ru".into()),
            },
            Increment::arguments("st\"}"),
        ])
        .push_text(&["Rust is ", "great."]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());
    let sid = SessionId::from("s1");

    let (steps, report) = agent.chat(&sid, "tell me about rust").await.unwrap().collect_steps().await;

    assert_eq!(steps.len(), 4);
    assert_eq!(steps[0].content, "Let me check.");

    assert_eq!(steps[1].kind, StepKind::ToolCall);
    assert_eq!(steps[1].content, "Calling tool: search_duckduckgo");
    assert_eq!(steps[1].tool_args.as_ref().unwrap()["query"], "rust");
    assert!(steps[1].tool_result.is_none());

    assert_eq!(steps[2].kind, StepKind::ToolCall);
    let result: Value = serde_json::from_str(steps[2].tool_result.as_deref().unwrap()).unwrap();
    assert_eq!(result[0]["title"], "About rust");

    assert_eq!(steps[3].content, "Rust is great.");

    let assistant = report.assistant.unwrap();
    assert_eq!(assistant.content, "Let me check.\nRust is great.");
    assert_eq!(assistant.tool_calls.len(), 1);
    let call = &assistant.tool_calls[0];
    assert_eq!(call.status(), ToolCallStatus::Completed);
    assert_eq!(call.message_id, assistant.id);
    assert_eq!(call.parameters["query"], "rust");

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    let followup = &requests[1].messages;
    let echo = &followup[followup.len() - 2];
    assert_eq!(echo.role, Role::Assistant);
    assert_eq!(echo.function_call.as_ref().unwrap().name, "search_duckduckgo");
    let function = followup.last().unwrap();
    assert_eq!(function.role, Role::Function);
    assert_eq!(function.name.as_deref(), Some("search_duckduckgo"));

    let history = agent.sessions().history(&sid).await;
    assert_eq!(history.len(), 2, "function messages stay out of history");
}

#[tokio::test]
async fn text_streamed_during_call_arguments_is_kept() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_stream(vec![
            Increment::FunctionCall {
                name: Some("search_duckduckgo".into()),
                arguments: Some("{\"query\":".into()),
            },
            Increment::text("Let me check that.\n"),
            Increment::arguments("\"x\"}"),
        ])
        .push_text(&["final"]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());
    let sid = SessionId::from("held-back");

    let (steps, report) = agent.chat(&sid, "look it up").await.unwrap().collect_steps().await;

    assert_eq!(
        contents(&steps),
        vec![
            "Let me check that.",
            "Calling tool: search_duckduckgo",
            "Calling tool: search_duckduckgo",
            "final",
        ]
    );
    assert_eq!(steps[0].kind, StepKind::Thinking);
    assert_eq!(report.assistant.unwrap().content, "Let me check that.\nfinal");

    let requests = backend.requests();
    let followup = &requests[1].messages;
    let echo = &followup[followup.len() - 2];
    assert_eq!(echo.content, "Let me check that.\n");
    assert!(echo.function_call.is_some());
}

#[tokio::test]
async fn failing_tool_is_reported_and_turn_continues() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_function_call("flaky", &["{}"])
        .push_text(&["Search is unavailable right now."]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());

    let (steps, report) = agent.chat(&SessionId::from("s"), "q").await.unwrap().collect_steps().await;

    assert!(report.is_success());
    assert_eq!(steps.len(), 3);
    assert!(steps[1]
        .tool_result
        .as_deref()
        .unwrap()
        .contains("search backend unreachable"));
    assert_eq!(steps[2].content, "Search is unavailable right now.");

    let call = &report.tool_calls[0];
    assert_eq!(call.status(), ToolCallStatus::Failed);
    assert!(call.result().unwrap().contains("search backend unreachable"));

    let function = backend.requests()[1].messages.last().cloned().unwrap();
    let content: Value = serde_json::from_str(&function.content).unwrap();
    assert!(content["error"].as_str().unwrap().contains("unreachable"));
}

#[tokio::test]
async fn unknown_tool_fails_the_call_not_the_turn() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_function_call("does_not_exist", &["{}"])
        .push_text(&["ok"]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());

    let report = agent.chat(&SessionId::from("s"), "q").await.unwrap().finish().await;
    assert!(report.is_success());
    assert_eq!(report.tool_calls[0].status(), ToolCallStatus::Failed);
}

#[tokio::test]
async fn transient_open_failure_is_retried() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_open_error(BackendError::RateLimited)
        .push_text(&["recovered"]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());

    let (steps, report) = agent.chat(&SessionId::from("s"), "q").await.unwrap().collect_steps().await;
    assert!(report.is_success());
    assert_eq!(contents(&steps), vec!["recovered"]);
    assert_eq!(backend.requests().len(), 2);
}

#[tokio::test]
async fn failure_before_first_increment_is_retried() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_items(vec![ScriptItem::Fail(BackendError::Timeout)])
        .push_text(&["second try"]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());

    let (steps, report) = agent.chat(&SessionId::from("s"), "q").await.unwrap().collect_steps().await;
    assert!(report.is_success());
    assert_eq!(contents(&steps), vec!["second try"]);
}

#[tokio::test]
async fn retry_budget_exhausted() {
    let backend = Arc::new(ScriptedBackend::new());
    for _ in 0..3 {
        backend.push_open_error(BackendError::RateLimited);
    }
    let agent = agent(&backend, search_registry(), AgentConfig::default());
    let sid = SessionId::from("s");

    let (steps, report) = agent.chat(&sid, "q").await.unwrap().collect_steps().await;

    assert_eq!(report.state, TurnState::Failed);
    assert_eq!(steps.len(), 1);
    assert_eq!(
        steps[0].content,
        "Error: backend still failing after 3 attempts: Rate limited"
    );
    assert_eq!(backend.requests().len(), 3);

    let history = agent.sessions().history(&sid).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);
}

#[tokio::test]
async fn permanent_failure_is_not_retried() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_open_error(BackendError::Api {
        status: 401,
        message: "invalid key".into(),
    });
    let agent = agent(&backend, search_registry(), AgentConfig::default());

    let (steps, report) = agent.chat(&SessionId::from("s"), "q").await.unwrap().collect_steps().await;
    assert_eq!(report.state, TurnState::Failed);
    assert_eq!(contents(&steps), vec!["Error: API error (HTTP 401): invalid key"]);
    assert_eq!(backend.requests().len(), 1);
}

#[tokio::test]
async fn failure_after_output_is_terminal() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_items(vec![
            ScriptItem::Emit(Increment::text("partial\n")),
            ScriptItem::Fail(BackendError::Network("connection reset".into())),
        ])
        .push_text(&["never used"]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());

    let (steps, report) = agent.chat(&SessionId::from("s"), "q").await.unwrap().collect_steps().await;
    assert_eq!(report.state, TurnState::Failed);
    assert_eq!(
        contents(&steps),
        vec!["partial", "Error: Network error: connection reset"]
    );
    assert_eq!(backend.remaining(), 1);
}

#[tokio::test]
async fn unterminated_arguments_fail_the_turn() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_function_call("search_duckduckgo", &["{\"query\": "]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());

    let (steps, report) = agent.chat(&SessionId::from("s"), "q").await.unwrap().collect_steps().await;
    assert_eq!(report.state, TurnState::Failed);
    assert_eq!(steps.len(), 1);
    assert!(steps[0].content.starts_with("Error: stream ended inside call to `search_duckduckgo`"));
}

#[tokio::test]
async fn forced_call_applies_to_first_round_only() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_function_call("search_duckduckgo", &["{\"query\": \"news\"}"])
        .push_text(&["done"]);
    let config = AgentConfig {
        function_call: FunctionCallPolicy::Force,
        ..AgentConfig::default()
    };
    let agent = agent(&backend, search_registry(), config);

    agent.chat(&SessionId::from("s"), "q").await.unwrap().finish().await;

    let requests = backend.requests();
    assert_eq!(
        requests[0].function_call,
        FunctionCallMode::Force("search_duckduckgo".into())
    );
    assert_eq!(requests[1].function_call, FunctionCallMode::Auto);
}

#[tokio::test]
async fn function_calling_disabled_sends_no_functions() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_text(&["plain"]);
    let config = AgentConfig {
        function_call: FunctionCallPolicy::None,
        ..AgentConfig::default()
    };
    let agent = agent(&backend, search_registry(), config);

    agent.chat(&SessionId::from("s"), "q").await.unwrap().finish().await;

    let request = &backend.requests()[0];
    assert_eq!(request.function_call, FunctionCallMode::None);
    assert!(request.functions.is_empty());
    assert!(!request.messages[0].content.contains("following tools"));
}

#[tokio::test]
async fn tool_rounds_are_capped() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_function_call("search_duckduckgo", &["{\"query\": \"a\"}"])
        .push_text(&["final answer"]);
    let config = AgentConfig {
        max_tool_rounds: 1,
        ..AgentConfig::default()
    };
    let agent = agent(&backend, search_registry(), config);

    let report = agent.chat(&SessionId::from("s"), "q").await.unwrap().finish().await;
    assert!(report.is_success());

    let requests = backend.requests();
    assert_eq!(requests[0].function_call, FunctionCallMode::Auto);
    assert_eq!(requests[1].function_call, FunctionCallMode::None);
    assert!(requests[1].functions.is_empty());
}

#[tokio::test]
async fn tool_request_past_the_cap_fails() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_function_call("search_duckduckgo", &["{\"query\": \"a\"}"])
        .push_function_call("search_duckduckgo", &["{\"query\": \"b\"}"]);
    let config = AgentConfig {
        max_tool_rounds: 1,
        ..AgentConfig::default()
    };
    let agent = agent(&backend, search_registry(), config);

    let (steps, report) = agent.chat(&SessionId::from("s"), "q").await.unwrap().collect_steps().await;
    assert_eq!(report.state, TurnState::Failed);
    assert_eq!(report.tool_calls.len(), 1);
    assert_eq!(
        steps.last().unwrap().content,
        "Error: model kept requesting tools after 1 tool rounds"
    );
}

#[tokio::test]
async fn reject_policy_refuses_concurrent_turn() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_items(vec![
            ScriptItem::Wait(Duration::from_millis(100)),
            ScriptItem::Emit(Increment::text("slow")),
        ])
        .push_text(&["later"]);
    let config = AgentConfig {
        busy_policy: BusyPolicy::Reject,
        ..AgentConfig::default()
    };
    let agent = agent(&backend, search_registry(), config);
    let sid = SessionId::from("s");

    let first = agent.chat(&sid, "one").await.unwrap();
    let err = agent.chat(&sid, "two").await.err().unwrap();
    assert!(matches!(err, AgentError::SessionBusy(ref s) if *s == sid));

    first.finish().await;
    let report = agent.chat(&sid, "three").await.unwrap().finish().await;
    assert!(report.is_success());

    let history = agent.sessions().history(&sid).await;
    let users: Vec<_> = history
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(users, vec!["one", "three"]);
}

#[tokio::test]
async fn queue_policy_serializes_turns() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_items(vec![
            ScriptItem::Wait(Duration::from_millis(50)),
            ScriptItem::Emit(Increment::text("first answer")),
        ])
        .push_text(&["second answer"]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());
    let sid = SessionId::from("s");

    let first = agent.chat(&sid, "first").await.unwrap();
    let second = {
        let agent = agent.clone();
        let sid = sid.clone();
        tokio::spawn(async move { agent.chat(&sid, "second").await.unwrap().finish().await })
    };

    let first_report = first.finish().await;
    let second_report = second.await.unwrap();
    assert!(first_report.is_success());
    assert!(second_report.is_success());

    let history = agent.sessions().history(&sid).await;
    let order: Vec<_> = history.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(order, vec!["first", "first answer", "second", "second answer"]);
}

#[tokio::test]
async fn sessions_run_independently() {
    let backend = Arc::new(ScriptedBackend::new());
    backend
        .push_items(vec![
            ScriptItem::Emit(Increment::text("a\n")),
            ScriptItem::Wait(Duration::from_millis(100)),
            ScriptItem::Emit(Increment::text("a2")),
        ])
        .push_text(&["b"]);
    let config = AgentConfig {
        busy_policy: BusyPolicy::Reject,
        ..AgentConfig::default()
    };
    let agent = agent(&backend, search_registry(), config);

    let mut a = agent.chat(&SessionId::from("a"), "qa").await.unwrap();
    assert_eq!(a.next_step().await.unwrap().content, "a");

    let b = agent.chat(&SessionId::from("b"), "qb").await.unwrap();
    let (b_steps, b_report) = b.collect_steps().await;
    assert!(b_report.is_success());
    assert_eq!(contents(&b_steps), vec!["b"]);

    let (a_rest, a_report) = a.collect_steps().await;
    assert!(a_report.is_success());
    assert_eq!(contents(&a_rest), vec!["a2"]);
}

#[tokio::test]
async fn dropping_the_stream_cancels_but_tool_finishes() {
    let finished = Arc::new(AtomicBool::new(false));
    let mut registry = ToolRegistry::new();
    {
        let finished = Arc::clone(&finished);
        registry
            .register_blocking_fn(
                ToolDescriptor::new("slow", "Takes a while", json!({"type": "object"})),
                move |_| {
                    std::thread::sleep(Duration::from_millis(100));
                    finished.store(true, Ordering::SeqCst);
                    Ok(json!("done"))
                },
            )
            .unwrap();
    }
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_function_call("slow", &["{}"]).push_text(&["unused"]);
    let agent = agent(&backend, registry, AgentConfig::default());
    let sid = SessionId::from("s");

    let mut stream = agent.chat(&sid, "q").await.unwrap();
    let announce = stream.next_step().await.unwrap();
    assert_eq!(announce.kind, StepKind::ToolCall);
    drop(stream);

    let handle = agent.sessions().get(&sid).await.unwrap();
    for _ in 0..200 {
        if !handle.is_busy() && finished.load(Ordering::SeqCst) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!handle.is_busy(), "session released after cancellation");
    assert!(finished.load(Ordering::SeqCst), "started tool ran to completion");

    assert_eq!(backend.requests().len(), 1);
    let history = agent.sessions().history(&sid).await;
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn step_stream_implements_stream() {
    use futures_util::StreamExt;

    let backend = Arc::new(ScriptedBackend::new());
    backend.push_text(&["x\ny\n"]);
    let agent = agent(&backend, search_registry(), AgentConfig::default());

    let stream = agent.chat(&SessionId::from("s"), "q").await.unwrap();
    let steps: Vec<ThinkingStep> = StreamExt::collect(stream).await;
    assert_eq!(steps.len(), 2);
}
