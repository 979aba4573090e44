//! Name-keyed tool registry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::handler::{BlockingFnTool, FnTool, ToolHandle};
use super::{BlockingTool, Tool, ToolArgs, ToolDescriptor, ToolResult};
use crate::error::ToolError;

/// Default number of blocking handlers allowed to run at once.
pub const DEFAULT_BLOCKING_POOL: usize = 4;

struct RegisteredTool {
    descriptor: ToolDescriptor,
    handle: ToolHandle,
}

/// Registry of callable tools.
///
/// Mutated only during startup; afterwards it is shared behind an `Arc` and
/// read concurrently without locking.
pub struct ToolRegistry {
    tools: HashMap<String, RegisteredTool>,
    blocking_pool: Arc<Semaphore>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::with_blocking_pool(DEFAULT_BLOCKING_POOL)
    }

    pub fn with_blocking_pool(size: usize) -> Self {
        Self {
            tools: HashMap::new(),
            blocking_pool: Arc::new(Semaphore::new(size.max(1))),
        }
    }

    pub fn register(&mut self, tool: impl Tool + 'static) -> Result<(), ToolError> {
        let descriptor = tool.descriptor();
        self.insert(descriptor, ToolHandle::Async(Arc::new(tool)))
    }

    pub fn register_blocking(&mut self, tool: impl BlockingTool + 'static) -> Result<(), ToolError> {
        let descriptor = tool.descriptor();
        self.insert(descriptor, ToolHandle::Blocking(Arc::new(tool)))
    }

    pub fn register_fn<F, Fut>(&mut self, descriptor: ToolDescriptor, f: F) -> Result<(), ToolError>
    where
        F: Fn(ToolArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult> + Send + 'static,
    {
        self.register(FnTool::new(descriptor, f))
    }

    pub fn register_blocking_fn<F>(
        &mut self,
        descriptor: ToolDescriptor,
        f: F,
    ) -> Result<(), ToolError>
    where
        F: Fn(ToolArgs) -> ToolResult + Send + Sync + 'static,
    {
        self.register_blocking(BlockingFnTool::new(descriptor, f))
    }

    fn insert(&mut self, descriptor: ToolDescriptor, handle: ToolHandle) -> Result<(), ToolError> {
        validate_descriptor(&descriptor)?;
        let name = descriptor.name.clone();
        if self.tools.contains_key(&name) {
            warn!(tool = %name, "Replacing previously registered tool");
        }
        debug!(tool = %name, "Registered tool");
        self.tools
            .insert(name, RegisteredTool { descriptor, handle });
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Registered tool names, sorted.
    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Human-readable description of a tool.
    pub fn describe(&self, name: &str) -> Option<&str> {
        self.tools.get(name).map(|t| t.descriptor.description.as_str())
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.get(name).map(|t| &t.descriptor)
    }

    /// All descriptors, sorted by name.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut descriptors: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor.clone()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Invoke a tool by name.
    pub async fn run(&self, name: &str, args: ToolArgs) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.handle.invoke(name, args, &self.blocking_pool).await
    }
}

fn validate_descriptor(descriptor: &ToolDescriptor) -> Result<(), ToolError> {
    let invalid = |reason: &str| ToolError::InvalidTool {
        name: descriptor.name.clone(),
        reason: reason.to_string(),
    };

    let name = &descriptor.name;
    if name.is_empty() || name.len() > 64 {
        return Err(invalid("name must be 1-64 characters"));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid("name may only contain letters, digits, '_' and '-'"));
    }
    if !descriptor.parameters.is_object() {
        return Err(invalid("parameter schema must be a JSON object"));
    }
    Ok(())
}
