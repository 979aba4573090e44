//! Server-Sent Events (SSE) streaming parser.
//!
//! Chat Completions streams arrive as SSE. This module turns any buffered
//! byte source, or a reqwest response body, into a stream of [`SseEvent`]s.

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio_util::io::StreamReader;

use crate::error::BackendError;

/// A single SSE event parsed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// The event type, when the server names one.
    pub event: Option<String>,
    /// The event data, multi-line data joined with `\n`.
    pub data: String,
}

pub type SseStream = BoxStream<'static, Result<SseEvent, BackendError>>;

struct ParserState<R> {
    lines: Lines<R>,
    event: Option<String>,
    data: String,
    done: bool,
}

impl<R> ParserState<R> {
    fn take_event(&mut self) -> Option<SseEvent> {
        if self.data.is_empty() {
            self.event = None;
            return None;
        }
        Some(SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data),
        })
    }
}

/// Parse SSE events from a buffered reader.
pub fn sse_events<R>(reader: R) -> SseStream
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let state = ParserState {
        lines: reader.lines(),
        event: None,
        data: String::new(),
        done: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        if state.done {
            return None;
        }
        loop {
            let line = match state.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    // Flush any remaining event
                    state.done = true;
                    let event = state.take_event()?;
                    return Some((Ok(event), state));
                }
                Err(e) => {
                    state.done = true;
                    return Some((Err(BackendError::Network(e.to_string())), state));
                }
            };

            if line.is_empty() {
                // Empty line = end of event
                match state.take_event() {
                    Some(event) => return Some((Ok(event), state)),
                    None => continue,
                }
            }

            if let Some(event_type) = line.strip_prefix("event:") {
                state.event = Some(event_type.trim_start().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                let data = data.strip_prefix(' ').unwrap_or(data);
                if !state.data.is_empty() {
                    state.data.push('\n');
                }
                state.data.push_str(data);
            }
            // Ignore other fields (id:, retry:, comments)
        }
    })
    .boxed()
}

/// Parse SSE events from a streaming HTTP response body.
pub fn sse_response(response: reqwest::Response) -> SseStream {
    let byte_stream = response
        .bytes_stream()
        .map(|result| result.map_err(std::io::Error::other));
    let reader = tokio::io::BufReader::new(StreamReader::new(byte_stream));
    sse_events(reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::TryStreamExt;

    async fn parse(input: &'static str) -> Vec<SseEvent> {
        sse_events(input.as_bytes()).try_collect().await.unwrap()
    }

    #[tokio::test]
    async fn data_records_split_on_blank_lines() {
        let events = parse("data: {\"a\":1}\n\ndata: {\"a\":2}\n\n").await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].data, "{\"a\":1}");
        assert_eq!(events[1].data, "{\"a\":2}");
        assert!(events[0].event.is_none());
    }

    #[tokio::test]
    async fn named_events_and_multiline_data() {
        let events = parse("event: message\ndata: line one\ndata: line two\n\n").await;
        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("message".into()),
                data: "line one\nline two".into(),
            }]
        );
    }

    #[tokio::test]
    async fn comments_and_unknown_fields_ignored() {
        let events = parse(": keep-alive\nid: 7\nretry: 100\ndata:[DONE]\n\n").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "[DONE]");
    }

    #[tokio::test]
    async fn trailing_event_without_blank_line_is_flushed() {
        let events = parse("data: tail").await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "tail");
    }

    #[tokio::test]
    async fn crlf_line_endings() {
        let events = parse("data: x\r\n\r\n").await;
        assert_eq!(events[0].data, "x");
    }
}
