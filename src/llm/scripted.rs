//! In-process model for development & testing
//!
//! Replays queued replies in order and records every request it sees,
//! so the pipeline can run without a provider.

use crate::error::PipelineError;
use crate::llm::ChatModel;
use crate::models::Message;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply
    pub fn reply(self, text: impl Into<String>) -> Self {
        lock(&self.replies).push_back(Ok(text.into()));
        self
    }

    /// Queue a failure
    pub fn fail(self, err: PipelineError) -> Self {
        lock(&self.replies).push_back(Err(err));
        self
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<Vec<Message>> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, messages: &[Message]) -> Result<Message> {
        lock(&self.requests).push(messages.to_vec());

        let next = lock(&self.replies).pop_front();
        match next {
            Some(Ok(text)) => Ok(Message::ai(text)),
            Some(Err(err)) => Err(err),
            None => Err(PipelineError::LlmError(
                "ScriptedModel has no reply queued".to_string(),
            )),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
