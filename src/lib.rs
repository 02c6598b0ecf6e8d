//! Chart Research Pipeline
//!
//! A linear three-stage LLM pipeline:
//! - Researcher extracts insights from the conversation
//! - Chart-Generator turns the research into chart-friendly JSON (kept raw)
//! - Final-Answer combines research and chart data into the reply
//!
//! Each stage returns a partial update that is merged into an accumulating
//! state before the next stage runs.
//!
//! LOOP:
//! QUERY → RESEARCH → MERGE → CHART → MERGE → ANSWER → MERGE → DONE

pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod stages;
pub mod state;

pub use error::Result;

// Re-export common types
pub use config::{LlmProvider, Settings};
pub use error::PipelineError;
pub use llm::{build_chat_model, ChatModel};
pub use models::*;
pub use pipeline::{run_agent, Phase, Pipeline, PipelineRun};
pub use state::{MergeStrategy, PipelineState, StageUpdate, StateField, StateSchema};
