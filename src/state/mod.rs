//! Pipeline state accumulator
//!
//! Holds the evolving state of one run and merges each stage's partial
//! update into it. Every field has a declared merge strategy; the schema
//! table is consulted on each merge instead of being implied by the types.

use crate::error::PipelineError;
use crate::models::{ChartRecord, Message};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Named fields of [`PipelineState`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Messages,
    ResearcherData,
    ChartData,
}

/// How an incoming value combines with the current one
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// `current ++ incoming`, arrival order preserved
    Append,
    /// `incoming` wins
    Replace,
}

/// Full accumulated record threaded through all stages
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PipelineState {
    pub messages: Vec<Message>,
    pub researcher_data: Vec<String>,
    pub chart_data: Vec<ChartRecord>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a run with the user's query as the only message
    pub fn from_query(query: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::human(query)],
            ..Self::default()
        }
    }

    /// Most recently appended research text
    pub fn latest_research(&self) -> Option<&str> {
        self.researcher_data.last().map(String::as_str)
    }

    pub fn latest_chart(&self) -> Option<&ChartRecord> {
        self.chart_data.last()
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Partial record a stage contributes. `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StageUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Message>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub researcher_data: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_data: Option<Vec<ChartRecord>>,
}

impl StageUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn with_researcher_data(mut self, data: Vec<String>) -> Self {
        self.researcher_data = Some(data);
        self
    }

    pub fn with_chart_data(mut self, data: Vec<ChartRecord>) -> Self {
        self.chart_data = Some(data);
        self
    }

    /// Fields present in this update
    pub fn fields(&self) -> Vec<StateField> {
        let mut fields = Vec::with_capacity(3);
        if self.messages.is_some() {
            fields.push(StateField::Messages);
        }
        if self.researcher_data.is_some() {
            fields.push(StateField::ResearcherData);
        }
        if self.chart_data.is_some() {
            fields.push(StateField::ChartData);
        }
        fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }
}

/// Per-field merge strategy table
#[derive(Debug, Clone)]
pub struct StateSchema {
    strategies: HashMap<StateField, MergeStrategy>,
}

impl StateSchema {
    /// Schema with no declared fields
    pub fn empty() -> Self {
        Self {
            strategies: HashMap::new(),
        }
    }

    /// Every field appends
    pub fn appending() -> Self {
        Self::empty()
            .declare(StateField::Messages, MergeStrategy::Append)
            .declare(StateField::ResearcherData, MergeStrategy::Append)
            .declare(StateField::ChartData, MergeStrategy::Append)
    }

    pub fn declare(mut self, field: StateField, strategy: MergeStrategy) -> Self {
        self.strategies.insert(field, strategy);
        self
    }

    pub fn strategy(&self, field: StateField) -> Option<MergeStrategy> {
        self.strategies.get(&field).copied()
    }

    /// `merge(current, update) -> new`
    pub fn merge(&self, mut current: PipelineState, update: StageUpdate) -> Result<PipelineState> {
        self.apply(&mut current, update)?;
        Ok(current)
    }

    /// Merge `update` into `state` in place.
    ///
    /// All fields are checked against the schema before anything is
    /// written, so a rejected update leaves `state` untouched.
    pub fn apply(&self, state: &mut PipelineState, update: StageUpdate) -> Result<()> {
        if let Some(field) = update
            .fields()
            .into_iter()
            .find(|f| self.strategy(*f).is_none())
        {
            return Err(PipelineError::UndeclaredField(field.to_string()));
        }

        let StageUpdate {
            messages,
            researcher_data,
            chart_data,
        } = update;

        if let Some(incoming) = messages {
            let strategy = self.require(StateField::Messages)?;
            combine(&mut state.messages, incoming, strategy);
        }
        if let Some(incoming) = researcher_data {
            let strategy = self.require(StateField::ResearcherData)?;
            combine(&mut state.researcher_data, incoming, strategy);
        }
        if let Some(incoming) = chart_data {
            let strategy = self.require(StateField::ChartData)?;
            combine(&mut state.chart_data, incoming, strategy);
        }

        debug!(
            messages = state.messages.len(),
            researcher_data = state.researcher_data.len(),
            chart_data = state.chart_data.len(),
            "State merged"
        );

        Ok(())
    }

    fn require(&self, field: StateField) -> Result<MergeStrategy> {
        self.strategy(field)
            .ok_or_else(|| PipelineError::UndeclaredField(field.to_string()))
    }
}

impl Default for StateSchema {
    fn default() -> Self {
        Self::appending()
    }
}

fn combine<T>(current: &mut Vec<T>, incoming: Vec<T>, strategy: MergeStrategy) {
    match strategy {
        MergeStrategy::Append => current.extend(incoming),
        MergeStrategy::Replace => *current = incoming,
    }
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateField::Messages => "messages",
            StateField::ResearcherData => "researcher_data",
            StateField::ChartData => "chart_data",
        };
        write!(f, "{}", s)
    }
}
