//! Process-wide settings
//!
//! Built once in `main` from the environment (after `.env` is loaded) and
//! passed down explicitly.

use crate::error::PipelineError;
use crate::Result;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Which text-generation backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LlmProvider {
    #[default]
    Ollama,
    Gemini,
}

impl FromStr for LlmProvider {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(LlmProvider::Ollama),
            "gemini" => Ok(LlmProvider::Gemini),
            other => Err(PipelineError::ConfigError(format!(
                "Unknown LLM_PROVIDER '{}' (expected 'ollama' or 'gemini')",
                other
            ))),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::Ollama => write!(f, "ollama"),
            LlmProvider::Gemini => write!(f, "gemini"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub provider: LlmProvider,
    pub model: String,
    pub ollama_base_url: String,
    pub gemini_api_key: Option<String>,
    /// Sampling temperature; 0.0 keeps generation deterministic
    pub temperature: f32,
    pub timeout: Duration,
}

impl Settings {
    /// Read settings from process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("LLM_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => LlmProvider::default(),
        };

        let model = get("LLM_MODEL").unwrap_or_else(|| match provider {
            LlmProvider::Ollama => DEFAULT_OLLAMA_MODEL.to_string(),
            LlmProvider::Gemini => DEFAULT_GEMINI_MODEL.to_string(),
        });

        let ollama_base_url = get("OLLAMA_BASE_URL")
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let gemini_api_key = get("GEMINI_API_KEY");
        if provider == LlmProvider::Gemini && gemini_api_key.is_none() {
            return Err(PipelineError::ConfigError(
                "GEMINI_API_KEY not configured".to_string(),
            ));
        }

        let timeout_secs = match get("LLM_TIMEOUT_SECS") {
            Some(raw) => parse_timeout(&raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(Self {
            provider,
            model,
            ollama_base_url,
            gemini_api_key,
            temperature: 0.0,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            model: DEFAULT_OLLAMA_MODEL.to_string(),
            ollama_base_url: DEFAULT_OLLAMA_URL.to_string(),
            gemini_api_key: None,
            temperature: 0.0,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn parse_timeout(raw: &str) -> Result<u64> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(secs),
        _ => Err(PipelineError::ConfigError(format!(
            "LLM_TIMEOUT_SECS must be a positive integer, got '{}'",
            raw
        ))),
    }
}
