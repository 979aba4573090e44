//! System, role and task prompts.

use zero_config::AgentRole;

use crate::tools::ToolDescriptor;

/// Templated prompt text for one model.
#[derive(Debug, Clone)]
pub struct PromptManager {
    model_name: String,
}

/// A canned task the caller can phrase as a user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    Search { query: String },
    Analyze { content: String },
    Summarize { content: String },
    Plan { task_description: String },
}

impl PromptManager {
    pub fn new(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
        }
    }

    /// Base system prompt, listing `tools` when any are offered.
    pub fn chat_prompt(&self, tools: &[ToolDescriptor]) -> String {
        if tools.is_empty() {
            return format!(
                "You are an AI assistant powered by {}.\n\
                 You have access to various tools to help you complete tasks.\n\
                 Always be helpful, accurate, and concise in your responses.",
                self.model_name
            );
        }

        let tools_description = tools
            .iter()
            .map(|t| format!("- {}: {}", t.name, t.description))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "You are an AI assistant powered by {}.\n\
             You have access to the following tools:\n\
             {tools_description}\n\n\
             IMPORTANT: When you are asked about any information that you're not 100% certain \
             about, especially regarding recent developments, news, or specific details, you MUST \
             use the search tool to find accurate and up-to-date information. Do not make \
             assumptions or rely solely on your training data.\n\n\
             When you need to search for information or perform specific tasks, use the \
             appropriate tools.\n\
             Always be helpful, accurate, and concise in your responses.",
            self.model_name
        )
    }

    pub fn role_prompt(&self, role: AgentRole) -> &'static str {
        match role {
            AgentRole::Assistant => {
                "You are a helpful AI assistant. Your goal is to provide accurate and useful \
                 information to users.\n\
                 IMPORTANT: You MUST use the search tool to verify information when:\n\
                 1. Asked about recent developments or news\n\
                 2. Unsure about specific details or facts\n\
                 3. Need to provide up-to-date information\n\
                 4. Asked about topics that might have changed since your training\n\n\
                 Never make assumptions about information you're not certain about. Always \
                 search to verify."
            }
            AgentRole::Searcher => {
                "You are a research-focused AI assistant. Your primary goal is to find accurate \
                 and up-to-date information.\n\
                 Use the search tool to gather information and provide well-researched responses."
            }
            AgentRole::Analyzer => {
                "You are an analytical AI assistant. Your goal is to analyze information and \
                 provide insights.\n\
                 Use the search tool to gather data and then analyze it to provide meaningful \
                 conclusions."
            }
            AgentRole::Planner => {
                "You are a planning-focused AI assistant. Your goal is to help users plan and \
                 organize tasks.\n\
                 Use the search tool to gather relevant information that can help in planning."
            }
        }
    }

    pub fn task_prompt(&self, task: &Task) -> String {
        match task {
            Task::Search { query } => format!(
                "Please search for information about: {query}\n\
                 Focus on finding the most relevant and up-to-date information."
            ),
            Task::Analyze { content } => {
                format!("Please analyze the following information and provide insights:\n{content}")
            }
            Task::Summarize { content } => {
                format!("Please summarize the following information concisely:\n{content}")
            }
            Task::Plan { task_description } => format!(
                "Please help plan the following task:\n\
                 {task_description}\n\
                 Consider all necessary steps and potential challenges."
            ),
        }
    }

    /// Full system prompt for a turn: base prompt, then the role prompt.
    pub fn system_prompt(&self, role: AgentRole, tools: &[ToolDescriptor]) -> String {
        format!("{}\n\n{}", self.chat_prompt(tools), self.role_prompt(role))
    }
}
