//! Chart-generator stage
//!
//! Turns the latest research into chart-oriented data with a fresh,
//! single-turn request. The reply is stored as-is in a [`ChartRecord`];
//! it is never parsed.

use crate::error::PipelineError;
use crate::llm::ChatModel;
use crate::models::{ChartRecord, Message};
use crate::pipeline::Phase;
use crate::stages::Stage;
use crate::state::{PipelineState, StageUpdate};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub struct ChartGeneratorStage {
    model: Arc<dyn ChatModel>,
}

impl ChartGeneratorStage {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

pub(crate) fn build_chart_prompt(research: &str) -> String {
    format!(
        "Convert the following research into chart-friendly JSON data.\n\n\
         Return only JSON.\n\n\
         Research:\n{}",
        research
    )
}

#[async_trait]
impl Stage for ChartGeneratorStage {
    fn name(&self) -> &'static str {
        "chart_generator"
    }

    fn phase(&self) -> Phase {
        Phase::Charting
    }

    async fn run(&self, state: &PipelineState) -> Result<StageUpdate> {
        let research = state.latest_research().ok_or_else(|| {
            PipelineError::MissingPrerequisite(
                "chart generation needs at least one researcher_data entry".to_string(),
            )
        })?;

        info!(research_chars = research.len(), "Chart generator: requesting chart data");

        // No history on purpose: the model sees only this one message.
        let request = [Message::human(build_chart_prompt(research))];
        let response = self.model.invoke(&request).await?;
        let record = ChartRecord::new(response.content.clone());

        Ok(StageUpdate::new()
            .with_messages(vec![response])
            .with_chart_data(vec![record]))
    }
}
