use crate::{Compare, LinkedObjectRef, Operand};
use serde::{Deserialize, Serialize};

pub type StepId = String;

/// What a step does once its event has been published
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndAction {
    /// Stop advancing until an external caller re-triggers the graph.
    #[default]
    Hold,
    /// Wait for every linked successor's interaction before advancing.
    HoldForCombine,
    /// Advance to the linked successors immediately.
    NextEvent,
}

/// One authored unit of a flow graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub event_name: String,
    #[serde(default)]
    pub linked_event_names: Vec<String>,
    #[serde(default)]
    pub interactive_target: Option<LinkedObjectRef>,
    #[serde(default)]
    pub end_action: EndAction,
    #[serde(default)]
    pub enter_event_name: Option<String>,
    #[serde(default)]
    pub exit_event_name: Option<String>,
    #[serde(default)]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub content: StepContent,
}

impl Step {
    pub fn new(id: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            event_name: event_name.into(),
            linked_event_names: Vec::new(),
            interactive_target: None,
            end_action: EndAction::default(),
            enter_event_name: None,
            exit_event_name: None,
            condition: None,
            content: StepContent::default(),
        }
    }

    pub fn with_links<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.linked_event_names
            .extend(links.into_iter().map(Into::into));
        self
    }

    pub fn with_target(mut self, name: impl Into<String>) -> Self {
        self.interactive_target = Some(LinkedObjectRef::new(name));
        self
    }

    pub fn with_end_action(mut self, end_action: EndAction) -> Self {
        self.end_action = end_action;
        self
    }

    pub fn with_enter_event(mut self, name: impl Into<String>) -> Self {
        self.enter_event_name = Some(name.into());
        self
    }

    pub fn with_exit_event(mut self, name: impl Into<String>) -> Self {
        self.exit_event_name = Some(name.into());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.content.text = Some(text.into());
        self
    }

    pub fn target_name(&self) -> Option<&str> {
        self.interactive_target
            .as_ref()
            .map(|t| t.display_name.as_str())
    }

    pub fn is_terminal(&self) -> bool {
        self.linked_event_names.is_empty()
            && self
                .condition
                .as_ref()
                .map_or(true, |c| c.when_false.is_empty())
    }
}

/// Presentation payload handed to collaborators when a step fires.
/// The engine forwards it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContent {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub hand_tip: Option<String>,
    #[serde(default)]
    pub voice: Option<MediaCue>,
    #[serde(default)]
    pub camera_timeline: Option<MediaCue>,
    #[serde(default)]
    pub object_timeline: Option<MediaCue>,
    #[serde(default)]
    pub timelines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCue {
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// Branch carried by a condition step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub compare: Compare,
    pub left: OperandSource,
    pub right: OperandSource,
    /// Successors taken when the comparison is false.
    #[serde(default)]
    pub when_false: Vec<String>,
    #[serde(default)]
    pub fallback: Fallback,
}

impl Condition {
    pub fn new(compare: Compare, left: OperandSource, right: OperandSource) -> Self {
        Self {
            compare,
            left,
            right,
            when_false: Vec::new(),
            fallback: Fallback::default(),
        }
    }

    pub fn otherwise<I, S>(mut self, links: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.when_false.extend(links.into_iter().map(Into::into));
        self
    }

    pub fn with_fallback(mut self, fallback: Fallback) -> Self {
        self.fallback = fallback;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandSource {
    Literal(Operand),
    Variable(String),
}

impl OperandSource {
    pub fn literal(value: impl Into<Operand>) -> Self {
        OperandSource::Literal(value.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        OperandSource::Variable(name.into())
    }
}

/// Branch taken when a condition cannot be decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fallback {
    #[default]
    WhenFalse,
    Stall,
}
