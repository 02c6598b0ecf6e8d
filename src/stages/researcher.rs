//! Researcher stage
//!
//! Sends the whole conversation, behind a fixed research instruction, and
//! records the reply both as a message and as research text.

use crate::llm::ChatModel;
use crate::models::Message;
use crate::pipeline::Phase;
use crate::stages::Stage;
use crate::state::{PipelineState, StageUpdate};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub const RESEARCHER_INSTRUCTION: &str =
    "You are a research assistant. Extract useful information and insights.";

pub struct ResearcherStage {
    model: Arc<dyn ChatModel>,
}

impl ResearcherStage {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    fn build_request(state: &PipelineState) -> Vec<Message> {
        let mut request = Vec::with_capacity(state.messages.len() + 1);
        request.push(Message::system(RESEARCHER_INSTRUCTION));
        request.extend(state.messages.iter().cloned());
        request
    }
}

#[async_trait]
impl Stage for ResearcherStage {
    fn name(&self) -> &'static str {
        "researcher"
    }

    fn phase(&self) -> Phase {
        Phase::Researching
    }

    async fn run(&self, state: &PipelineState) -> Result<StageUpdate> {
        let request = Self::build_request(state);

        info!(history = state.messages.len(), "Researcher: requesting insights");

        let response = self.model.invoke(&request).await?;
        let research = response.content.clone();

        Ok(StageUpdate::new()
            .with_messages(vec![response])
            .with_researcher_data(vec![research]))
    }
}
