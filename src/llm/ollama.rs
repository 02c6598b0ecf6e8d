//! Ollama chat client
//!
//! Talks to a local or remote Ollama server through `/api/chat` with
//! streaming disabled.

use crate::config::Settings;
use crate::error::PipelineError;
use crate::llm::{http_client, ChatModel};
use crate::models::{Message, Role};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        Ok(Self {
            client: http_client(settings.timeout)?,
            base_url: settings.ollama_base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            timeout_secs: settings.timeout.as_secs(),
        })
    }

    fn build_request<'a>(&'a self, messages: &'a [Message]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: wire_role(m.role),
                    content: &m.content,
                })
                .collect(),
            stream: false,
            options: Options {
                temperature: self.temperature,
            },
        }
    }
}

#[async_trait]
impl ChatModel for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn invoke(&self, messages: &[Message]) -> Result<Message> {
        let url = format!("{}/api/chat", self.base_url);
        let request = self.build_request(messages);

        info!(model = %self.model, messages = messages.len(), "Calling Ollama");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = PipelineError::from_transport(e, self.timeout_secs);
                error!("Ollama request failed: {}", err);
                err
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            error!("Ollama error response ({}): {}", status, error_text);
            return Err(PipelineError::LlmError(format!(
                "Ollama returned {}: {}",
                status, error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::from_transport(e, self.timeout_secs))?;

        let content = parse_chat_response(&body)?;

        info!(chars = content.len(), "Ollama response received");

        Ok(Message::ai(content))
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::Human => "user",
        Role::Ai => "assistant",
    }
}

fn parse_chat_response(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        PipelineError::LlmError(format!("Ollama parse error: {} | raw={}", e, body))
    })?;

    if let Some(err) = parsed.error {
        return Err(PipelineError::LlmError(format!("Ollama error: {}", err)));
    }

    parsed
        .message
        .map(|m| m.content)
        .ok_or_else(|| PipelineError::LlmError("Empty response from Ollama".to_string()))
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: Options,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct Options {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ResponseMessage>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}
