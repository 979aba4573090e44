//! Web search via the DuckDuckGo Instant Answer API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use zero_config::ToolsConfig;

use super::{Tool, ToolArgs, ToolDescriptor, ToolRegistry, ToolResult};
use crate::error::ToolError;

pub const SEARCH_TOOL_NAME: &str = "search_duckduckgo";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub snippet: String,
}

pub struct DuckDuckGoSearch {
    http: reqwest::Client,
    endpoint: String,
    default_max_results: usize,
}

impl DuckDuckGoSearch {
    pub fn new(config: &ToolsConfig) -> Result<Self, ToolError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(config.search_timeout_secs))
            .user_agent(concat!("zero/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ToolError::InvalidTool {
                name: SEARCH_TOOL_NAME.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            http,
            endpoint: config.search_endpoint.clone(),
            default_max_results: config.search_max_results as usize,
        })
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchResult>, reqwest::Error> {
        debug!(query, max_results, "DuckDuckGo search");
        let body: Value = self
            .http
            .get(&self.endpoint)
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(parse_instant_answer(&body, max_results))
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearch {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            SEARCH_TOOL_NAME,
            "Search the web using DuckDuckGo. Use this tool whenever you need to verify \
             information, find recent developments, or when you're unsure about any details.",
            json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to return",
                        "default": self.default_max_results
                    }
                },
                "required": ["query"]
            }),
        )
    }

    async fn call(&self, args: ToolArgs) -> ToolResult {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or("missing required string argument `query`")?;
        let max_results = args
            .get("max_results")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(self.default_max_results);

        let results = self.search(query, max_results).await?;
        Ok(serde_json::to_value(results)?)
    }
}

/// Flatten an Instant Answer response into at most `max_results` hits.
///
/// The abstract (if any) comes first, then direct results, then related
/// topics including those nested one level under a category.
pub fn parse_instant_answer(body: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    let abstract_text = body["AbstractText"].as_str().unwrap_or_default();
    let abstract_url = body["AbstractURL"].as_str().unwrap_or_default();
    if !abstract_text.is_empty() && !abstract_url.is_empty() {
        let heading = body["Heading"].as_str().unwrap_or_default();
        results.push(SearchResult {
            title: if heading.is_empty() {
                title_from_text(abstract_text)
            } else {
                heading.to_string()
            },
            link: abstract_url.to_string(),
            snippet: abstract_text.to_string(),
        });
    }

    let topics = body["Results"]
        .as_array()
        .into_iter()
        .chain(body["RelatedTopics"].as_array())
        .flatten();
    for topic in topics {
        match topic["Topics"].as_array() {
            Some(nested) => results.extend(nested.iter().filter_map(topic_result)),
            None => results.extend(topic_result(topic)),
        }
    }

    results.truncate(max_results);
    results
}

fn topic_result(topic: &Value) -> Option<SearchResult> {
    let text = topic["Text"].as_str().filter(|t| !t.is_empty())?;
    let link = topic["FirstURL"].as_str().filter(|u| !u.is_empty())?;
    Some(SearchResult {
        title: title_from_text(text),
        link: link.to_string(),
        snippet: text.to_string(),
    })
}

fn title_from_text(text: &str) -> String {
    text.split(" - ").next().unwrap_or(text).trim().to_string()
}

/// Register the tools zero ships with.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    config: &ToolsConfig,
) -> Result<(), ToolError> {
    registry.register(DuckDuckGoSearch::new(config)?)
}
