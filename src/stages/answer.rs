//! Final-answer stage
//!
//! Terminal stage: combines the latest research and chart record into one
//! single-turn request. Its reply is the pipeline's answer.

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

pub struct FinalAnswerStage {
    model: Arc<dyn ChatModel>,
}

impl FinalAnswerStage {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

pub(crate) fn build_answer_prompt(research: &str, chart: &ChartRecord) -> String {
    format!(
        "Provide a final answer using the research and chart data.\n\n\
         Research:\n{}\n\n\
         Chart Data:\n{}",
        research, chart
    )
}

#[async_trait]
impl Stage for FinalAnswerStage {
    fn name(&self) -> &'static str {
        "final_answer"
    }

    fn phase(&self) -> Phase {
        Phase::Answering
    }

    async fn run(&self, state: &PipelineState) -> Result<StageUpdate> {
        let research = state.latest_research().ok_or_else(|| {
            PipelineError::MissingPrerequisite(
                "final answer needs at least one researcher_data entry".to_string(),
            )
        })?;
        let chart = state.latest_chart().ok_or_else(|| {
            PipelineError::MissingPrerequisite(
                "final answer needs at least one chart_data entry".to_string(),
            )
        })?;

        info!("Final answer: composing response");

        let request = [Message::human(build_answer_prompt(research, chart))];
        let response = self.model.invoke(&request).await?;

        Ok(StageUpdate::new().with_messages(vec![response]))
    }
}
