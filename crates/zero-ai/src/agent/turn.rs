//! One turn: generation rounds, tool execution, and step emission.

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use zero_common::new_id;
use zero_config::FunctionCallPolicy;

use super::{AgentShared, TurnReport, TurnState};
use crate::backend::{FunctionCallEcho, FunctionCallMode, GenerationRequest, PromptMessage};
use crate::decoder::{DecodedEvent, StreamDecoder, ToolRequest};
use crate::error::{AgentError, BackendError};
use crate::prompt::PromptManager;
use crate::session::TurnGuard;
use crate::steps::ThinkingStep;
use crate::{Message, Role, ToolCall};

/// Sends steps to the client, turning text deltas into whole lines.
struct StepSink {
    tx: mpsc::Sender<ThinkingStep>,
    pending: String,
}

impl StepSink {
    async fn send(&self, step: ThinkingStep) -> Result<(), AgentError> {
        self.tx.send(step).await.map_err(|_| AgentError::ChannelClosed)
    }

    /// Buffer `delta`; emit every completed line as a thinking step.
    async fn push_text(&mut self, delta: &str) -> Result<(), AgentError> {
        self.pending.push_str(delta);
        while let Some(end) = self.pending.find('\n') {
            let chunk: String = self.pending.drain(..=end).collect();
            let line = chunk.trim();
            if !line.is_empty() {
                self.send(ThinkingStep::thinking(line)).await?;
            }
        }
        Ok(())
    }

    /// Emit whatever partial line is buffered.
    async fn flush(&mut self) -> Result<(), AgentError> {
        let chunk = std::mem::take(&mut self.pending);
        let line = chunk.trim();
        if line.is_empty() {
            return Ok(());
        }
        self.send(ThinkingStep::thinking(line)).await
    }

    async fn closed(&self) {
        self.tx.closed().await
    }
}

enum RoundEnd {
    Finished,
    Tool(ToolRequest),
}

pub(super) struct Turn {
    session: TurnGuard,
    shared: Arc<AgentShared>,
    steps: StepSink,
    state: TurnState,
    /// Id of the assistant message this turn will persist.
    assistant_id: String,
    context: Vec<PromptMessage>,
    text: String,
    round_text: String,
    tool_calls: Vec<ToolCall>,
    tool_rounds: u32,
}

impl Turn {
    pub(super) fn new(
        session: TurnGuard,
        tx: mpsc::Sender<ThinkingStep>,
        shared: Arc<AgentShared>,
    ) -> Self {
        Self {
            session,
            shared,
            steps: StepSink {
                tx,
                pending: String::new(),
            },
            state: TurnState::Idle,
            assistant_id: new_id(),
            context: Vec::new(),
            text: String::new(),
            round_text: String::new(),
            tool_calls: Vec::new(),
            tool_rounds: 0,
        }
    }

    pub(super) async fn run(mut self) -> TurnReport {
        info!("Turn started");
        let outcome = self.drive().await;

        let mut assistant = None;
        let mut error = None;
        match outcome {
            Ok(()) => {
                let message = Message::new(
                    self.session.id().clone(),
                    Role::Assistant,
                    std::mem::take(&mut self.text),
                )
                .with_id(self.assistant_id.clone())
                .with_tool_calls(self.tool_calls.clone());
                self.session.push(message.clone());
                assistant = Some(message);
                self.transition(TurnState::Idle);
                info!(tool_calls = self.tool_calls.len(), "Turn completed");
            }
            Err(AgentError::ChannelClosed) => {
                self.transition(TurnState::Cancelled);
                info!("Client went away, turn abandoned");
            }
            Err(e) => {
                error!(error = %e, "Turn failed");
                self.transition(TurnState::Failed);
                if self.steps.flush().await.is_ok() {
                    self.steps.send(ThinkingStep::error(&e)).await.ok();
                }
                error = Some(e.to_string());
            }
        }

        TurnReport {
            session_id: self.session.id().clone(),
            state: self.state,
            assistant,
            tool_calls: self.tool_calls,
            error,
        }
    }

    fn transition(&mut self, next: TurnState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Turn state");
            self.state = next;
        }
    }

    async fn drive(&mut self) -> Result<(), AgentError> {
        let functions = match self.shared.config.function_call {
            FunctionCallPolicy::None => Vec::new(),
            _ => self.shared.bridge.registry().descriptors(),
        };
        let prompts = PromptManager::new(self.session.config().model.clone());
        let system_prompt = prompts.system_prompt(self.shared.config.role, &functions);
        self.context = self.session.build_context(&system_prompt);

        let mut round = 0u32;
        loop {
            let mode = self.function_call_mode(round);
            let request = GenerationRequest::new(self.session.config(), self.context.clone())
                .with_functions(functions.clone(), mode);
            debug!(round, function_call = ?request.function_call, "Opening generation stream");

            match self.generate(&request).await? {
                RoundEnd::Finished => return self.steps.flush().await,
                RoundEnd::Tool(call) => self.run_tool(call).await?,
            }
            round += 1;
        }
    }

    fn function_call_mode(&self, round: u32) -> FunctionCallMode {
        let config = &self.shared.config;
        if self.tool_rounds >= config.max_tool_rounds {
            return FunctionCallMode::None;
        }
        match config.function_call {
            FunctionCallPolicy::None => FunctionCallMode::None,
            FunctionCallPolicy::Auto => FunctionCallMode::Auto,
            FunctionCallPolicy::Force if round == 0 => {
                if self.shared.bridge.registry().contains(&config.force_tool) {
                    FunctionCallMode::Force(config.force_tool.clone())
                } else {
                    warn!(tool = %config.force_tool, "Forced tool is not registered, using auto");
                    FunctionCallMode::Auto
                }
            }
            FunctionCallPolicy::Force => FunctionCallMode::Auto,
        }
    }

    /// Consume one generation stream until it ends or requests a tool.
    async fn generate(&mut self, request: &GenerationRequest) -> Result<RoundEnd, AgentError> {
        let backend = self.session.backend();
        let max_argument_bytes = self.shared.config.max_argument_bytes as usize;
        let mut attempt = 0u32;

        'attempts: loop {
            self.transition(TurnState::AwaitingModel);
            let opened = tokio::select! {
                biased;
                _ = self.steps.closed() => return Err(AgentError::ChannelClosed),
                opened = backend.stream(request) => opened,
            };
            let mut stream = match opened {
                Ok(stream) => stream,
                Err(e) => {
                    self.backoff(&mut attempt, e).await?;
                    continue 'attempts;
                }
            };

            let mut decoder = StreamDecoder::new(max_argument_bytes);
            let mut consumed = false;
            loop {
                let item = tokio::select! {
                    biased;
                    _ = self.steps.closed() => return Err(AgentError::ChannelClosed),
                    item = stream.next() => item,
                };
                let increment = match item {
                    None => break,
                    Some(Ok(increment)) => increment,
                    // Nothing reached the client from this stream yet, so a
                    // fresh attempt cannot duplicate output.
                    Some(Err(e)) if !consumed => {
                        self.backoff(&mut attempt, e).await?;
                        continue 'attempts;
                    }
                    Some(Err(e)) => return Err(e.into()),
                };
                consumed = true;
                let events = decoder.push(increment)?;
                if let Some(call) = self.handle_events(events).await? {
                    return Ok(RoundEnd::Tool(call));
                }
            }

            let events = decoder.finish()?;
            return Ok(match self.handle_events(events).await? {
                Some(call) => RoundEnd::Tool(call),
                None => RoundEnd::Finished,
            });
        }
    }

    /// Sleep before the next attempt, or give up.
    async fn backoff(&self, attempt: &mut u32, error: BackendError) -> Result<(), AgentError> {
        let retry = &self.shared.retry;
        if !retry.should_retry(*attempt, &error) {
            if error.is_retryable() && retry.max_retries > 0 {
                return Err(AgentError::RetryExhausted {
                    attempts: *attempt + 1,
                    last: error,
                });
            }
            return Err(error.into());
        }

        let delay = retry.backoff(*attempt);
        *attempt += 1;
        warn!(attempt = *attempt, ?delay, error = %error, "Transient backend failure, retrying");
        tokio::select! {
            biased;
            _ = self.steps.closed() => Err(AgentError::ChannelClosed),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Apply one batch of decoded events. Every text delta in the batch is
    /// recorded; the first tool request, if any, ends the round.
    async fn handle_events(
        &mut self,
        events: Vec<DecodedEvent>,
    ) -> Result<Option<ToolRequest>, AgentError> {
        let mut request = None;
        for event in events {
            match event {
                DecodedEvent::TextDelta(delta) => {
                    self.transition(TurnState::StreamingText);
                    self.text.push_str(&delta);
                    self.round_text.push_str(&delta);
                    self.steps.push_text(&delta).await?;
                }
                DecodedEvent::ToolRequest(call) if request.is_none() => request = Some(call),
                DecodedEvent::ToolRequest(call) => {
                    warn!(tool = %call.name, "Dropping second tool request from one increment");
                }
            }
        }
        Ok(request)
    }

    async fn run_tool(&mut self, call: ToolRequest) -> Result<(), AgentError> {
        let limit = self.shared.config.max_tool_rounds;
        if self.tool_rounds >= limit {
            return Err(AgentError::ToolRoundLimit(limit));
        }
        self.transition(TurnState::AwaitingTool);
        self.steps.flush().await?;

        let announce = ThinkingStep::tool_call(call.name.clone(), call.args.clone());
        self.steps.send(announce.clone()).await?;

        let echo = FunctionCallEcho {
            name: call.name.clone(),
            arguments: Value::Object(call.args.clone()).to_string(),
        };
        let pending = self
            .shared
            .bridge
            .spawn(self.session.id(), &self.assistant_id, call);
        let outcome = tokio::select! {
            biased;
            _ = self.steps.closed() => return Err(AgentError::ChannelClosed),
            outcome = pending.finish() => outcome,
        };

        let mut assistant = PromptMessage::new(Role::Assistant, std::mem::take(&mut self.round_text));
        assistant.function_call = Some(echo);
        self.context.push(assistant);
        self.context.push(PromptMessage::from(&outcome.message));

        let result = outcome.call.result().unwrap_or_default().to_string();
        self.tool_calls.push(outcome.call);
        self.tool_rounds += 1;

        self.steps.send(announce.with_result(result)).await
    }
}

