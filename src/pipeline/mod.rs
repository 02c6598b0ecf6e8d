//! Pipeline runner
//!
//! NotStarted → Researching → Charting → Answering → Done
//!
//! Stages run strictly in declared order. Each one sees the state as merged
//! from every stage before it, and its update is merged before the next one
//! starts. A stage error stops the run (phase `Failed`) and is returned
//! unchanged; nothing is retried or resumed.

use crate::error::PipelineError;
use crate::llm::ChatModel;
use crate::stages::{ChartGeneratorStage, FinalAnswerStage, ResearcherStage, Stage};
use crate::state::{PipelineState, StateSchema};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Where a run currently is
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    NotStarted,
    Researching,
    Charting,
    Answering,
    Done,
    Failed,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }
}

/// Ordered list of stages plus the merge schema they write through
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    schema: StateSchema,
}

impl Pipeline {
    pub fn new(schema: StateSchema) -> Self {
        Self {
            stages: Vec::new(),
            schema,
        }
    }

    pub fn with_stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Researcher → Chart-Generator → Final-Answer over an append-only schema
    pub fn research_chart_answer(model: Arc<dyn ChatModel>) -> Self {
        Self::new(StateSchema::appending())
            .with_stage(ResearcherStage::new(model.clone()))
            .with_stage(ChartGeneratorStage::new(model.clone()))
            .with_stage(FinalAnswerStage::new(model))
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn schema(&self) -> &StateSchema {
        &self.schema
    }

    /// Prepare a run without executing it
    pub fn start(&self, initial: PipelineState) -> PipelineRun<'_> {
        PipelineRun {
            pipeline: self,
            state: initial,
            phase: Phase::NotStarted,
            transitions: Vec::new(),
        }
    }

    /// `run(initial, stages) -> final`. No partial state is returned on error.
    pub async fn run(&self, initial: PipelineState) -> Result<PipelineState> {
        let mut run = self.start(initial);
        run.execute().await?;
        Ok(run.into_state())
    }
}

/// A single execution of a [`Pipeline`]
pub struct PipelineRun<'p> {
    pipeline: &'p Pipeline,
    state: PipelineState,
    phase: Phase,
    transitions: Vec<Phase>,
}

impl<'p> PipelineRun<'p> {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Phases entered so far, in order
    pub fn transitions(&self) -> &[Phase] {
        &self.transitions
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn into_state(self) -> PipelineState {
        self.state
    }

    /// Execute every stage once. A run can only be executed once.
    pub async fn execute(&mut self) -> Result<()> {
        if self.phase != Phase::NotStarted {
            return Err(PipelineError::ConfigError(format!(
                "pipeline run already executed (phase: {})",
                self.phase
            )));
        }

        let pipeline = self.pipeline;
        let start_time = Instant::now();

        info!(
            stages = ?pipeline.stage_names(),
            messages = self.state.messages.len(),
            "Pipeline: starting run"
        );

        for stage in &pipeline.stages {
            self.enter(stage.phase());

            let stage_start = Instant::now();
            let outcome = match stage.run(&self.state).await {
                Ok(update) => pipeline.schema.apply(&mut self.state, update),
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                error!(stage = stage.name(), error = %e, "Stage failed - aborting run");
                self.enter(Phase::Failed);
                return Err(e);
            }

            debug!(
                stage = stage.name(),
                elapsed_ms = stage_start.elapsed().as_millis() as u64,
                messages = self.state.messages.len(),
                "Stage merged"
            );
        }

        self.enter(Phase::Done);

        info!(
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            messages = self.state.messages.len(),
            "Pipeline: run complete"
        );

        Ok(())
    }

    fn enter(&mut self, phase: Phase) {
        debug!(from = %self.phase, to = %phase, "Phase transition");
        self.phase = phase;
        self.transitions.push(phase);
    }
}

/// Run the default pipeline on a single query and return the answer text
pub async fn run_agent(model: Arc<dyn ChatModel>, query: &str) -> Result<String> {
    let pipeline = Pipeline::research_chart_answer(model);
    let final_state = pipeline.run(PipelineState::from_query(query)).await?;

    final_state
        .last_message()
        .map(|m| m.content.clone())
        .ok_or_else(|| PipelineError::MissingPrerequisite("pipeline produced no messages".to_string()))
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::NotStarted => "NotStarted",
            Phase::Researching => "Researching",
            Phase::Charting => "Charting",
            Phase::Answering => "Answering",
            Phase::Done => "Done",
            Phase::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedModel;
    use crate::models::{ChartRecord, Message, Role};
    use crate::state::{MergeStrategy, StageUpdate, StateField};
    use async_trait::async_trait;
    use tokio_test::{assert_err, assert_ok};

    const QUERY: &str = "Give analysis of AI growth in last 5 years";

    fn scripted() -> Arc<ScriptedModel> {
        Arc::new(
            ScriptedModel::new()
                .reply("AI grew rapidly due to LLMs.")
                .reply(r#"{"growth":"high"}"#)
                .reply("AI has grown fast, driven by LLMs."),
        )
    }

    #[tokio::test]
    async fn test_full_run() {
        let model = scripted();
        let pipeline = Pipeline::research_chart_answer(model.clone());

        let final_state = assert_ok!(pipeline.run(PipelineState::from_query(QUERY)).await);

        let contents: Vec<&str> = final_state.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                QUERY,
                "AI grew rapidly due to LLMs.",
                r#"{"growth":"high"}"#,
                "AI has grown fast, driven by LLMs.",
            ]
        );
        assert_eq!(final_state.researcher_data, vec!["AI grew rapidly due to LLMs."]);
        assert_eq!(final_state.chart_data, vec![ChartRecord::new(r#"{"growth":"high"}"#)]);
        assert_eq!(model.call_count(), 3);
        assert_eq!(model.requests()[1].len(), 1);
    }

    #[tokio::test]
    async fn test_growth_is_independent_of_prior_length() {
        let mut initial = PipelineState::from_query("earlier question");
        initial.messages.push(Message::ai("earlier answer"));
        initial.messages.push(Message::human(QUERY));
        initial.researcher_data = vec!["r0".to_string(), "r1".to_string()];
        initial.chart_data = vec![ChartRecord::new("c0")];

        let pipeline = Pipeline::research_chart_answer(scripted());
        let final_state = pipeline.run(initial).await.unwrap();

        assert_eq!(final_state.messages.len(), 3 + 3);
        assert_eq!(final_state.researcher_data.len(), 3);
        assert_eq!(final_state.researcher_data[..2], ["r0".to_string(), "r1".to_string()]);
        assert_eq!(final_state.chart_data.len(), 2);
        assert_eq!(final_state.chart_data[0], ChartRecord::new("c0"));
        assert!(final_state.messages[3..].iter().all(|m| m.role == Role::Ai));
    }

    #[tokio::test]
    async fn test_phase_transitions() {
        let pipeline = Pipeline::research_chart_answer(scripted());
        let mut run = pipeline.start(PipelineState::from_query(QUERY));
        assert_eq!(run.phase(), Phase::NotStarted);

        assert_ok!(run.execute().await);

        assert_eq!(run.phase(), Phase::Done);
        assert!(run.phase().is_terminal());
        assert_eq!(
            run.transitions(),
            &[Phase::Researching, Phase::Charting, Phase::Answering, Phase::Done]
        );

        // a finished run cannot be executed again
        assert_err!(run.execute().await);
    }

    #[tokio::test]
    async fn test_final_stage_failure_aborts_run() {
        let model = Arc::new(
            ScriptedModel::new()
                .reply("AI grew rapidly due to LLMs.")
                .reply(r#"{"growth":"high"}"#)
                .fail(PipelineError::LlmError("connection refused".to_string())),
        );
        let pipeline = Pipeline::research_chart_answer(model.clone());

        let mut run = pipeline.start(PipelineState::from_query(QUERY));
        let err = run.execute().await.unwrap_err();

        assert!(err.to_string().contains("connection refused"));
        assert_eq!(run.phase(), Phase::Failed);
        assert_eq!(
            run.transitions(),
            &[Phase::Researching, Phase::Charting, Phase::Answering, Phase::Failed]
        );
        assert_eq!(run.state().messages.len(), 3);
        assert_eq!(run.state().researcher_data.len(), 1);
        assert_eq!(run.state().chart_data.len(), 1);

        // the consuming entry point returns only the error
        let model = Arc::new(
            ScriptedModel::new()
                .reply("r")
                .reply("c")
                .fail(PipelineError::Timeout { seconds: 120 }),
        );
        let result = Pipeline::research_chart_answer(model)
            .run(PipelineState::from_query(QUERY))
            .await;
        assert!(matches!(result, Err(PipelineError::Timeout { seconds: 120 })));
    }

    #[tokio::test]
    async fn test_first_stage_failure_stops_before_later_stages() {
        let model = Arc::new(
            ScriptedModel::new().fail(PipelineError::LlmError("unavailable".to_string())),
        );
        let pipeline = Pipeline::research_chart_answer(model.clone());

        let mut run = pipeline.start(PipelineState::from_query(QUERY));
        assert_err!(run.execute().await);

        assert_eq!(model.call_count(), 1);
        assert_eq!(run.state().messages.len(), 1);
        assert_eq!(run.transitions(), &[Phase::Researching, Phase::Failed]);
    }

    #[tokio::test]
    async fn test_chart_before_research_is_missing_prerequisite() {
        let model = Arc::new(ScriptedModel::new().reply("unused"));
        let pipeline = Pipeline::new(StateSchema::appending())
            .with_stage(ChartGeneratorStage::new(model.clone()));

        let result = pipeline.run(PipelineState::from_query(QUERY)).await;
        assert!(matches!(result, Err(PipelineError::MissingPrerequisite(_))));
        assert_eq!(model.call_count(), 0);
    }

    struct ChartOnlyStage;

    #[async_trait]
    impl Stage for ChartOnlyStage {
        fn name(&self) -> &'static str {
            "chart_only"
        }

        fn phase(&self) -> Phase {
            Phase::Charting
        }

        async fn run(&self, _state: &PipelineState) -> Result<StageUpdate> {
            Ok(StageUpdate::new().with_chart_data(vec![ChartRecord::new("{}")]))
        }
    }

    #[tokio::test]
    async fn test_undeclared_field_fails_fast() {
        let schema = StateSchema::empty().declare(StateField::Messages, MergeStrategy::Append);
        let pipeline = Pipeline::new(schema).with_stage(ChartOnlyStage);

        let mut run = pipeline.start(PipelineState::new());
        let err = run.execute().await.unwrap_err();

        assert!(matches!(err, PipelineError::UndeclaredField(_)));
        assert_eq!(run.phase(), Phase::Failed);
        assert!(run.state().chart_data.is_empty());
    }

    #[tokio::test]
    async fn test_empty_pipeline_returns_initial_state() {
        let pipeline = Pipeline::new(StateSchema::appending());
        let initial = PipelineState::from_query(QUERY);

        let final_state = pipeline.run(initial.clone()).await.unwrap();
        assert_eq!(final_state, initial);
    }

    #[tokio::test]
    async fn test_run_agent_returns_last_message() {
        let answer = run_agent(scripted(), QUERY).await.unwrap();
        assert_eq!(answer, "AI has grown fast, driven by LLMs.");
    }

    #[test]
    fn test_default_stage_order() {
        let pipeline = Pipeline::research_chart_answer(Arc::new(ScriptedModel::new()));
        assert_eq!(
            pipeline.stage_names(),
            vec!["researcher", "chart_generator", "final_answer"]
        );
        assert_eq!(
            pipeline.schema().strategy(StateField::ChartData),
            Some(MergeStrategy::Append)
        );
    }
}
