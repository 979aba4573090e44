//! zero-chat: line-oriented front end for the streaming chat agent.
//!
//! Reads one user turn per stdin line, runs it through a [`ChatAgent`], and
//! writes each thinking step to stdout in the chosen wire format. Logs go to
//! stderr so stdout carries only steps.

mod cli;

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;
use zero_ai::{register_builtin_tools, ChatAgent, OpenAiFactory, StepEncoder, ThinkingStep, ToolRegistry};
use zero_common::{ConfigError, SessionId, ZeroError};
use zero_config::schema::LogLevel;
use zero_config::ZeroConfig;

fn load_config(args: &cli::Args) -> Result<(ZeroConfig, Option<String>), ConfigError> {
    let loaded = match &args.config {
        Some(path) => zero_config::load_config_from(path),
        None => zero_config::load_config(),
    };
    resolve_config(loaded, |key| std::env::var(key).ok())
}

/// Fall back to defaults when the file is missing or unreadable. The fallback
/// still honours environment overrides; invalid values are never papered over.
fn resolve_config(
    loaded: Result<ZeroConfig, ConfigError>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(ZeroConfig, Option<String>), ConfigError> {
    match loaded {
        Ok(config) => Ok((config, None)),
        Err(e @ ConfigError::ValidationError(_)) => Err(e),
        Err(e) => {
            let mut config = ZeroConfig::default();
            zero_config::env::apply_overrides(&mut config, lookup);
            zero_config::validation::validate(&config)?;
            Ok((config, Some(e.to_string())))
        }
    }
}

fn init_logging(args: &cli::Args, config: &ZeroConfig) {
    let directive = match args.log_level.as_deref().and_then(LogLevel::parse) {
        Some(level) => format!("zero={}", level.as_str()),
        None => config.logging.directive(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_agent(config: &ZeroConfig) -> Result<ChatAgent, ZeroError> {
    let mut registry = ToolRegistry::with_blocking_pool(config.tools.blocking_pool_size as usize);
    register_builtin_tools(&mut registry, &config.tools)
        .map_err(|e| ZeroError::Tool(e.to_string()))?;
    tracing::info!(tools = ?registry.list_names(), "Tool registry ready");
    Ok(ChatAgent::from_config(
        config,
        Arc::new(OpenAiFactory),
        Arc::new(registry),
    ))
}

async fn run(args: cli::Args, config: ZeroConfig) -> Result<(), ZeroError> {
    let agent = build_agent(&config)?;
    let session_id = args
        .session
        .map(SessionId::from)
        .unwrap_or_default();
    let encoder = StepEncoder::new(args.format);
    tracing::info!(session_id = %session_id, format = ?args.format, "zero-chat ready");

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut turn = match agent.chat(&session_id, line).await {
            Ok(turn) => turn,
            Err(e) => {
                tracing::warn!(error = %e, "Turn refused");
                encoder.write_step(&mut stdout, &ThinkingStep::error(&e)).await?;
                continue;
            }
        };

        while let Some(step) = turn.next_step().await {
            encoder.write_step(&mut stdout, &step).await?;
        }

        let report = turn.finish().await;
        match &report.error {
            Some(error) => tracing::warn!(state = ?report.state, error = %error, "Turn ended with error"),
            None => tracing::debug!(
                state = ?report.state,
                tool_calls = report.tool_calls.len(),
                "Turn complete"
            ),
        }
    }

    stdout.flush().await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = cli::parse();

    let (config, load_error) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            init_logging(&args, &ZeroConfig::default());
            tracing::error!(error = %e, "Invalid configuration");
            std::process::exit(2);
        }
    };
    init_logging(&args, &config);
    if let Some(error) = load_error {
        tracing::warn!(error = %error, "Failed to load config file, using defaults and environment");
    }

    if let Err(e) = run(args, config).await {
        tracing::error!(error = %e, "zero-chat exited with error");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |key| {
            pairs
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults_with_env() {
        let loaded = Err(ConfigError::ParseError("bad toml".into()));
        let (config, warning) = resolve_config(
            loaded,
            env(&[("OPENAI_API_KEY", "sk-env"), ("LLM_API_BASE", "http://localhost:8000/v1")]),
        )
        .unwrap();
        assert_eq!(config.llm.api_key, "sk-env");
        assert_eq!(config.llm.api_base, "http://localhost:8000/v1");
        assert!(warning.unwrap().contains("bad toml"));
    }

    #[test]
    fn validation_error_is_not_replaced_by_defaults() {
        let loaded = Err(ConfigError::ValidationError("llm.temperature = 3".into()));
        let err = resolve_config(loaded, env(&[("OPENAI_API_KEY", "sk-env")])).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_env_on_fallback_is_rejected() {
        let loaded = Err(ConfigError::ParseError("bad toml".into()));
        let err = resolve_config(loaded, env(&[("LLM_TEMPERATURE", "3")])).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn loaded_config_is_used_as_is() {
        let (config, warning) = resolve_config(Ok(ZeroConfig::default()), env(&[])).unwrap();
        assert_eq!(config, ZeroConfig::default());
        assert!(warning.is_none());
    }
}
