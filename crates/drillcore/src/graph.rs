use crate::{Step, StepId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GraphId(pub Uuid);

impl GraphId {
    pub fn new() -> Self {
        GraphId(Uuid::new_v4())
    }
}

impl Default for GraphId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Complete authored flow graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowGraph {
    #[serde(default)]
    pub id: GraphId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub steps: Vec<Step>,
    /// Explicit entry links. When empty, every step without an incoming
    /// link is a start step.
    #[serde(default)]
    pub start: Vec<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
}

impl FlowGraph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: GraphId::new(),
            name: name.into(),
            description: None,
            steps: Vec::new(),
            start: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn add_step(&mut self, step: Step) -> StepId {
        let id = step.id.clone();
        self.steps.push(step);
        id
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_start(mut self, link: impl Into<String>) -> Self {
        self.start.push(link.into());
        self
    }

    pub fn with_section<I, S>(mut self, name: impl Into<String>, steps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections.push(Section {
            name: name.into(),
            steps: steps.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Find a step by link name: event name first, then id.
    pub fn find_step(&self, link: &str) -> Option<&Step> {
        self.steps
            .iter()
            .find(|s| s.event_name == link)
            .or_else(|| self.steps.iter().find(|s| s.id == link))
    }
}

/// Named group of steps reported together (one stage of an exercise)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub steps: Vec<String>,
}
