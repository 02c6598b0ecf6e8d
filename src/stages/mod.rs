//! Stage trait and the three built-in stages
//!
//! A stage reads the accumulated state and returns a partial update. It
//! never mutates the state itself; the runner merges what it returns.

use crate::pipeline::Phase;
use crate::state::{PipelineState, StageUpdate};
use crate::Result;
use async_trait::async_trait;

pub mod answer;
pub mod chart;
pub mod researcher;

pub use answer::FinalAnswerStage;
pub use chart::ChartGeneratorStage;
pub use researcher::ResearcherStage;

/// One discrete transformation step of the pipeline
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Phase the runner is in while this stage executes
    fn phase(&self) -> Phase;

    async fn run(&self, state: &PipelineState) -> Result<StageUpdate>;
}
