//! OpenAI-compatible Chat Completions backend.
//!
//! Speaks the streaming `functions` / `function_call` dialect of
//! `POST {api_base}/chat/completions`. Any server that implements that
//! surface (OpenAI, Azure, vLLM, llama.cpp, ...) can be pointed at through
//! `llm.api_base`.

mod api;
mod client;

pub use client::{OpenAiBackend, OpenAiFactory};
