//! Environment variable overrides.
//!
//! The service has always been configurable through `OPENAI_API_KEY` and the
//! `LLM_*` variables; they take precedence over values read from the file.

use tracing::warn;

use crate::schema::{LogLevel, ZeroConfig};

/// Apply overrides from the process environment.
pub fn apply_env_overrides(config: &mut ZeroConfig) {
    apply_overrides(config, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary lookup (used by tests).
pub fn apply_overrides(config: &mut ZeroConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup("OPENAI_API_KEY").filter(|v| !v.is_empty()) {
        config.llm.api_key = key;
    }
    if let Some(model) = lookup("LLM_MODEL_NAME").filter(|v| !v.is_empty()) {
        config.llm.model = model;
    }
    if let Some(base) = lookup("LLM_API_BASE").filter(|v| !v.is_empty()) {
        config.llm.api_base = base;
    }
    if let Some(v) = parsed(&lookup, "LLM_TEMPERATURE") {
        config.llm.temperature = v;
    }
    if let Some(v) = parsed(&lookup, "LLM_TOP_P") {
        config.llm.top_p = v;
    }
    if let Some(v) = parsed(&lookup, "LLM_MAX_TOKENS") {
        config.llm.max_tokens = Some(v);
    }
    if let Some(v) = parsed(&lookup, "LLM_TIMEOUT") {
        config.llm.timeout_secs = v;
    }
    if let Some(v) = parsed(&lookup, "LLM_RETRY_ATTEMPTS") {
        config.retry.max_retries = v;
    }
    if let Some(raw) = lookup("LOG_LEVEL") {
        match LogLevel::parse(&raw) {
            Some(level) => config.logging.level = level,
            None => warn!("ignoring LOG_LEVEL={raw}: unknown level"),
        }
    }
}

fn parsed<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("ignoring {key}={raw}: not a valid value");
            None
        }
    }
}
