//! Per-section validators: llm, retry, agent, tools.

use crate::schema::{FunctionCallPolicy, ZeroConfig};

use super::helpers::{validate_non_empty, validate_range, validate_range_f64};

/// Validate backend sampling and timeout settings.
pub(crate) fn validate_llm(errors: &mut Vec<String>, config: &ZeroConfig) {
    validate_non_empty(errors, "llm.model", &config.llm.model);
    validate_non_empty(errors, "llm.api_base", &config.llm.api_base);
    validate_range_f64(errors, "llm.temperature", config.llm.temperature, 0.0, 2.0);
    validate_range_f64(errors, "llm.top_p", config.llm.top_p, 0.0, 1.0);
    validate_range(errors, "llm.timeout_secs", config.llm.timeout_secs, 1, 600);
    if let Some(max_tokens) = config.llm.max_tokens {
        validate_range(errors, "llm.max_tokens", u64::from(max_tokens), 1, 128_000);
    }
}

/// Validate the retry budget.
pub(crate) fn validate_retry(errors: &mut Vec<String>, config: &ZeroConfig) {
    let retry = &config.retry;
    validate_range(errors, "retry.max_retries", u64::from(retry.max_retries), 0, 10);
    validate_range_f64(
        errors,
        "retry.backoff_multiplier",
        retry.backoff_multiplier,
        1.0,
        10.0,
    );
    validate_range_f64(errors, "retry.jitter", retry.jitter, 0.0, 1.0);
    if retry.initial_backoff_ms > retry.max_backoff_ms {
        errors.push(format!(
            "retry.initial_backoff_ms = {} exceeds retry.max_backoff_ms = {}",
            retry.initial_backoff_ms, retry.max_backoff_ms
        ));
    }
}

/// Validate orchestrator limits.
pub(crate) fn validate_agent(errors: &mut Vec<String>, config: &ZeroConfig) {
    let agent = &config.agent;
    validate_range(
        errors,
        "agent.max_tool_rounds",
        u64::from(agent.max_tool_rounds),
        1,
        20,
    );
    validate_range(
        errors,
        "agent.max_argument_bytes",
        u64::from(agent.max_argument_bytes),
        1024,
        16 * 1024 * 1024,
    );
    validate_range(
        errors,
        "agent.step_channel_capacity",
        u64::from(agent.step_channel_capacity),
        1,
        4096,
    );
    if agent.function_call == FunctionCallPolicy::Force {
        validate_non_empty(errors, "agent.force_tool", &agent.force_tool);
    }
}

/// Validate tool runtime settings.
pub(crate) fn validate_tools(errors: &mut Vec<String>, config: &ZeroConfig) {
    let tools = &config.tools;
    validate_range(
        errors,
        "tools.blocking_pool_size",
        u64::from(tools.blocking_pool_size),
        1,
        64,
    );
    validate_range(
        errors,
        "tools.search_max_results",
        u64::from(tools.search_max_results),
        1,
        25,
    );
    validate_range(
        errors,
        "tools.search_timeout_secs",
        tools.search_timeout_secs,
        1,
        120,
    );
}
