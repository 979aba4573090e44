//! Tool handler traits and closure adapters.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Semaphore;

use super::ToolDescriptor;
use crate::error::{ToolError, ToolFailure};

pub type ToolArgs = Map<String, Value>;
pub type ToolResult = Result<Value, ToolFailure>;

/// A tool whose work is naturally asynchronous (network, timers).
#[async_trait]
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    async fn call(&self, args: ToolArgs) -> ToolResult;
}

/// A tool with a synchronous body. Runs on the blocking pool.
pub trait BlockingTool: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    fn call(&self, args: ToolArgs) -> ToolResult;
}

/// Async tool backed by a closure.
pub struct FnTool<F> {
    descriptor: ToolDescriptor,
    handler: F,
}

impl<F> FnTool<F> {
    pub fn new(descriptor: ToolDescriptor, handler: F) -> Self {
        Self {
            descriptor,
            handler,
        }
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(ToolArgs) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult> + Send,
{
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    async fn call(&self, args: ToolArgs) -> ToolResult {
        (self.handler)(args).await
    }
}

/// Blocking tool backed by a closure.
pub struct BlockingFnTool<F> {
    descriptor: ToolDescriptor,
    handler: F,
}

impl<F> BlockingFnTool<F> {
    pub fn new(descriptor: ToolDescriptor, handler: F) -> Self {
        Self {
            descriptor,
            handler,
        }
    }
}

impl<F> BlockingTool for BlockingFnTool<F>
where
    F: Fn(ToolArgs) -> ToolResult + Send + Sync,
{
    fn descriptor(&self) -> ToolDescriptor {
        self.descriptor.clone()
    }

    fn call(&self, args: ToolArgs) -> ToolResult {
        (self.handler)(args)
    }
}

/// Uniform handle built at registration time.
#[derive(Clone)]
pub(crate) enum ToolHandle {
    Async(Arc<dyn Tool>),
    Blocking(Arc<dyn BlockingTool>),
}

impl ToolHandle {
    pub(crate) async fn invoke(
        &self,
        name: &str,
        args: ToolArgs,
        pool: &Arc<Semaphore>,
    ) -> Result<Value, ToolError> {
        let outcome = match self {
            ToolHandle::Async(tool) => tool.call(args).await,
            ToolHandle::Blocking(tool) => {
                let permit = Arc::clone(pool).acquire_owned().await.map_err(|_| {
                    ToolError::Execution {
                        name: name.to_string(),
                        source: "blocking pool is closed".into(),
                    }
                })?;
                let tool = Arc::clone(tool);
                let joined = tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    tool.call(args)
                })
                .await;
                match joined {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        return Err(ToolError::Panicked {
                            name: name.to_string(),
                        })
                    }
                }
            }
        };
        outcome.map_err(|source| ToolError::Execution {
            name: name.to_string(),
            source,
        })
    }
}
