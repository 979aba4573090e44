//! Incremental decoder for backend increments.
//!
//! Content passes straight through as [`DecodedEvent::TextDelta`]. Function
//! call fragments are accumulated until the concatenated arguments parse as
//! a JSON object, at which point exactly one [`DecodedEvent::ToolRequest`] is
//! produced and the accumulator is reset. Content that arrives mid-call is
//! held back and released just before that request.

use serde_json::{Map, Value};

use crate::backend::Increment;
use crate::error::DecodeError;

/// A complete request to run a named tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRequest {
    pub name: String,
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedEvent {
    TextDelta(String),
    ToolRequest(ToolRequest),
}

#[derive(Debug, Default)]
struct PendingCall {
    name: String,
    arguments: String,
}

/// Stateful decoder for one generation stream.
#[derive(Debug)]
pub struct StreamDecoder {
    pending: Option<PendingCall>,
    /// Content that arrived while a call was still accumulating.
    deferred: String,
    max_argument_bytes: usize,
}

impl StreamDecoder {
    pub fn new(max_argument_bytes: usize) -> Self {
        Self {
            pending: None,
            deferred: String::new(),
            max_argument_bytes,
        }
    }

    pub fn is_accumulating(&self) -> bool {
        self.pending.is_some()
    }

    /// Feed one increment and return whatever became complete.
    pub fn push(&mut self, increment: Increment) -> Result<Vec<DecodedEvent>, DecodeError> {
        match increment {
            Increment::Content(text) => {
                if text.is_empty() {
                    return Ok(Vec::new());
                }
                if self.pending.is_some() {
                    self.deferred.push_str(&text);
                    return Ok(Vec::new());
                }
                Ok(vec![DecodedEvent::TextDelta(text)])
            }
            Increment::FunctionCall { name, arguments } => {
                let pending = self.pending.get_or_insert_with(PendingCall::default);
                if let Some(name) = name.filter(|n| !n.is_empty()) {
                    pending.name = name;
                }
                if let Some(fragment) = arguments {
                    pending.arguments.push_str(&fragment);
                }
                if pending.arguments.len() > self.max_argument_bytes {
                    self.pending = None;
                    return Err(DecodeError::BufferOverflow {
                        limit: self.max_argument_bytes,
                    });
                }
                self.try_complete()
            }
        }
    }

    /// Signal end of stream.
    ///
    /// A named call with no argument text at all is treated as a call with
    /// empty arguments. Anything else still buffered is an error.
    pub fn finish(&mut self) -> Result<Vec<DecodedEvent>, DecodeError> {
        let mut events = Vec::new();
        self.drain_deferred(&mut events);
        if let Some(pending) = self.pending.take() {
            if pending.name.is_empty() {
                return Err(DecodeError::MissingName);
            }
            if !pending.arguments.trim().is_empty() {
                return Err(DecodeError::Unterminated {
                    buffered: pending.arguments.len(),
                    name: pending.name,
                });
            }
            events.push(DecodedEvent::ToolRequest(ToolRequest {
                name: pending.name,
                args: Map::new(),
            }));
        }
        Ok(events)
    }

    fn try_complete(&mut self) -> Result<Vec<DecodedEvent>, DecodeError> {
        let Some(pending) = self.pending.as_ref() else {
            return Ok(Vec::new());
        };
        if pending.name.is_empty() || pending.arguments.trim().is_empty() {
            return Ok(Vec::new());
        }
        let args = match serde_json::from_str::<Value>(&pending.arguments) {
            Ok(Value::Object(args)) => args,
            Ok(_) => {
                let name = pending.name.clone();
                self.pending = None;
                return Err(DecodeError::NotAnObject { name });
            }
            // Incomplete so far; wait for more fragments.
            Err(_) => return Ok(Vec::new()),
        };
        let name = self.pending.take().map(|p| p.name).unwrap_or_default();
        let mut events = Vec::new();
        self.drain_deferred(&mut events);
        events.push(DecodedEvent::ToolRequest(ToolRequest { name, args }));
        Ok(events)
    }

    fn drain_deferred(&mut self, events: &mut Vec<DecodedEvent>) {
        if !self.deferred.is_empty() {
            events.push(DecodedEvent::TextDelta(std::mem::take(&mut self.deferred)));
        }
    }
}

/// Decode a complete sequence of increments.
pub fn decode_all(
    increments: impl IntoIterator<Item = Increment>,
    max_argument_bytes: usize,
) -> Result<Vec<DecodedEvent>, DecodeError> {
    let mut decoder = StreamDecoder::new(max_argument_bytes);
    let mut events = Vec::new();
    for increment in increments {
        events.extend(decoder.push(increment)?);
    }
    events.extend(decoder.finish()?);
    Ok(events)
}
