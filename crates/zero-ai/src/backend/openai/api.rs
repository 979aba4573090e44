//! ChatBackend implementation for OpenAiBackend.

use async_trait::async_trait;
use futures_util::{future, stream, StreamExt};
use tracing::debug;

use crate::backend::{ChatBackend, GenerationRequest, IncrementStream};
use crate::error::BackendError;
use crate::streaming::sse_response;

use super::client::{parse_chunk, OpenAiBackend};

const DONE_SENTINEL: &str = "[DONE]";

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<IncrementStream, BackendError> {
        let body = self.build_request_body(request);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            functions = request.functions.len(),
            "Chat Completions streaming request"
        );

        let mut builder = self
            .http
            .post(self.endpoint())
            .timeout(request.timeout)
            .header("content-type", "application/json")
            .json(&body);
        if !self.config.api_key.is_empty() {
            builder = builder.bearer_auth(&self.config.api_key);
        }

        let response = builder.send().await.map_err(BackendError::from_reqwest)?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(BackendError::RateLimited);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = text.chars().take(200).collect::<String>();
            return Err(BackendError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let increments = sse_response(response)
            .take_while(|event| {
                future::ready(!matches!(event, Ok(e) if e.data.trim() == DONE_SENTINEL))
            })
            .flat_map(|event| {
                let items = match event.and_then(|e| parse_chunk(&e.data)) {
                    Ok(increments) => increments.into_iter().map(Ok).collect(),
                    Err(e) => vec![Err(e)],
                };
                stream::iter(items)
            });

        Ok(increments.boxed())
    }
}
