//! Scripted backend for tests.
//!
//! [`ScriptedBackend`] is a queue of pre-recorded generation streams. Each
//! call to [`ChatBackend::stream`] pops the next script, so a test can lay
//! out a whole multi-round turn up front and then assert on the requests
//! the orchestrator made.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use zero_config::LlmConfig;

use crate::backend::{BackendFactory, ChatBackend, GenerationRequest, Increment, IncrementStream};
use crate::error::BackendError;

/// One step of a scripted stream.
#[derive(Debug, Clone)]
pub enum ScriptItem {
    Emit(Increment),
    /// Fail the stream mid-way.
    Fail(BackendError),
    /// Stall before the next item.
    Wait(Duration),
}

type Script = Result<Vec<ScriptItem>, BackendError>;

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
pub struct ScriptedBackend {
    scripts: Mutex<VecDeque<Script>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_items(&self, items: Vec<ScriptItem>) -> &Self {
        locked(&self.scripts).push_back(Ok(items));
        self
    }

    pub fn push_stream(&self, increments: Vec<Increment>) -> &Self {
        self.push_items(increments.into_iter().map(ScriptItem::Emit).collect())
    }

    /// A stream of plain content chunks.
    pub fn push_text(&self, chunks: &[&str]) -> &Self {
        self.push_stream(chunks.iter().map(|c| Increment::text(*c)).collect())
    }

    /// A stream carrying one function call split into `fragments`.
    pub fn push_function_call(&self, name: &str, fragments: &[&str]) -> &Self {
        let mut increments = vec![Increment::function_name(name)];
        increments.extend(fragments.iter().map(|f| Increment::arguments(*f)));
        self.push_stream(increments)
    }

    /// Fail the next `stream` call before any increment is produced.
    pub fn push_open_error(&self, error: BackendError) -> &Self {
        locked(&self.scripts).push_back(Err(error));
        self
    }

    pub fn remaining(&self) -> usize {
        locked(&self.scripts).len()
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        locked(&self.requests).clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, request: &GenerationRequest) -> Result<IncrementStream, BackendError> {
        locked(&self.requests).push(request.clone());
        let script = locked(&self.scripts)
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::Config("no scripted stream left".into())))?;

        let items: VecDeque<ScriptItem> = script.into();
        let stream = futures_util::stream::unfold(items, |mut items| async move {
            loop {
                match items.pop_front()? {
                    ScriptItem::Wait(delay) => tokio::time::sleep(delay).await,
                    ScriptItem::Emit(increment) => return Some((Ok(increment), items)),
                    ScriptItem::Fail(error) => {
                        items.clear();
                        return Some((Err(error), items));
                    }
                }
            }
        });
        Ok(stream.boxed())
    }
}

/// Factory handing every session the same [`ScriptedBackend`].
#[derive(Debug, Default)]
pub struct ScriptedFactory {
    backend: Arc<ScriptedBackend>,
    created: AtomicUsize,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(backend: Arc<ScriptedBackend>) -> Self {
        Self {
            backend,
            created: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> &Arc<ScriptedBackend> {
        &self.backend
    }

    /// How many times a session asked for a backend.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

impl BackendFactory for ScriptedFactory {
    fn create(&self, _config: &LlmConfig) -> Result<Arc<dyn ChatBackend>, BackendError> {
        self.created.fetch_add(1, Ordering::SeqCst);
        let backend: Arc<dyn ChatBackend> = self.backend.clone();
        Ok(backend)
    }
}
