//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# zero configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[llm]
# model = "gpt-4.1-mini"
# api_base = "https://api.openai.com/v1"
# api_key = ""              # prefer the OPENAI_API_KEY environment variable
# temperature = 0.7         # 0.0-2.0
# top_p = 1.0               # 0.0-1.0
# max_tokens = 2000
# timeout_secs = 60         # 1-600

[retry]
# max_retries = 3           # 0-10, retries after the first attempt
# initial_backoff_ms = 500
# max_backoff_ms = 8000
# backoff_multiplier = 2.0
# jitter = 0.2              # 0.0-1.0

[agent]
# role = "assistant"        # assistant, searcher, analyzer, planner
# function_call = "auto"    # auto, none, force
# force_tool = "search_duckduckgo"
# max_tool_rounds = 5       # 1-20
# max_argument_bytes = 65536
# busy_policy = "queue"     # queue, reject
# step_channel_capacity = 64

[tools]
# blocking_pool_size = 4    # 1-64
# search_max_results = 5
# search_endpoint = "https://api.duckduckgo.com/"
# search_timeout_secs = 15

[logging]
# level = "info"            # trace, debug, info, warn, error
"##
    .to_string()
}
