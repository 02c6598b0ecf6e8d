//! Text-generation clients
//!
//! Every stage talks to the model through [`ChatModel`]: an ordered list of
//! role-tagged messages in, one `ai` message out. Providers are picked once
//! from [`Settings`] at startup.

use crate::config::{LlmProvider, Settings};
use crate::models::Message;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub mod gemini;
pub mod ollama;
pub mod scripted;

#[cfg(test)]
mod testutil;

pub use gemini::GeminiClient;
pub use ollama::OllamaClient;
pub use scripted::ScriptedModel;

/// Opaque text-generation service
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider name used in logs
    fn name(&self) -> &str;

    /// Generate one response message for the given history
    async fn invoke(&self, messages: &[Message]) -> Result<Message>;
}

/// Build the configured provider
pub fn build_chat_model(settings: &Settings) -> Result<Arc<dyn ChatModel>> {
    info!(
        provider = %settings.provider,
        model = %settings.model,
        timeout_secs = settings.timeout.as_secs(),
        "Configuring text-generation client"
    );

    let model: Arc<dyn ChatModel> = match settings.provider {
        LlmProvider::Ollama => Arc::new(OllamaClient::new(settings)?),
        LlmProvider::Gemini => Arc::new(GeminiClient::new(settings)?),
    };

    Ok(model)
}

/// Long-lived pooled HTTP client with a hard request timeout
pub(crate) fn http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(90))
        .pool_max_idle_per_host(8)
        .timeout(timeout)
        .build()?;

    Ok(client)
}
