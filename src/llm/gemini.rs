//! Gemini API client
//!
//! System messages are lifted into `system_instruction`; the rest of the
//! history becomes `contents` with `user`/`model` roles.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::config::Settings;
use crate::error::PipelineError;
use crate::llm::{http_client, ChatModel};
use crate::models::{Message, Role};
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let api_key = settings
            .gemini_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                PipelineError::ConfigError("GEMINI_API_KEY not configured".to_string())
            })?;

        Ok(Self {
            client: http_client(settings.timeout)?,
            api_key,
            base_url: GEMINI_BASE_URL.to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
            timeout_secs: settings.timeout.as_secs(),
        })
    }

    fn build_request(&self, messages: &[Message]) -> Result<GeminiRequest> {
        let mut system_parts = Vec::new();
        let mut contents = Vec::with_capacity(messages.len());

        for msg in messages {
            let part = Part {
                text: msg.content.clone(),
            };
            match msg.role {
                Role::System => system_parts.push(part),
                Role::Human => contents.push(Content {
                    role: Some("user".to_string()),
                    parts: vec![part],
                }),
                Role::Ai => contents.push(Content {
                    role: Some("model".to_string()),
                    parts: vec![part],
                }),
            }
        }

        if contents.is_empty() {
            return Err(PipelineError::LlmError(
                "Gemini request needs at least one non-system message".to_string(),
            ));
        }

        Ok(GeminiRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: self.temperature,
            },
            system_instruction: if system_parts.is_empty() {
                None
            } else {
                Some(SystemInstruction {
                    parts: system_parts,
                })
            },
        })
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn invoke(&self, messages: &[Message]) -> Result<Message> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model);
        let request = self.build_request(messages)?;

        info!(model = %self.model, messages = messages.len(), "Calling Gemini API");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                let err = PipelineError::from_transport(e, self.timeout_secs);
                error!("Gemini API request failed: {}", err);
                err
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Gemini API error response: {}", error_text);
            return Err(PipelineError::LlmError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::from_transport(e, self.timeout_secs))?;

        let answer = parse_generate_response(&body)?;

        info!(chars = answer.len(), "Gemini response received");

        Ok(Message::ai(answer))
    }
}

fn parse_generate_response(body: &str) -> Result<String> {
    let gemini_response: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        error!("Failed to parse Gemini response: {}", e);
        PipelineError::LlmError(format!("Gemini parse error: {}", e))
    })?;

    if let Some(usage) = &gemini_response.usage_metadata {
        info!(
            prompt_tokens = usage.prompt_token_count,
            candidate_tokens = usage.candidates_token_count,
            "Gemini usage"
        );
    }

    let candidate = gemini_response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::LlmError("No response from Gemini API".to_string()))?;

    candidate
        .content
        .parts
        .into_iter()
        .next()
        .map(|p| p.text)
        .ok_or_else(|| PipelineError::LlmError("Empty response from Gemini".to_string()))
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: i32,
    #[serde(default)]
    candidates_token_count: i32,
}
