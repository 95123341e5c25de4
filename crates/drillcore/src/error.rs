use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Authoring error: {0}")]
    Authoring(#[from] AuthoringError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Comparison error: {0}")]
    Compare(#[from] CompareError),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Step '{step}' cannot be resumed while {status}")]
    NotHeld { step: String, status: String },

    #[error("Graph not loaded: {0}")]
    GraphNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Defects in an authored graph, detected once when the graph is loaded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthoringError {
    #[error("Graph has no steps")]
    EmptyGraph,

    #[error("Step '{0}' has an empty event name")]
    EmptyEventName(String),

    #[error("Duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("Duplicate event name '{name}' on steps '{first}' and '{second}'")]
    DuplicateEventName {
        name: String,
        first: String,
        second: String,
    },

    #[error("Step '{step}' links to unknown step '{link}'")]
    UnknownLink { step: String, link: String },

    #[error("Step '{0}' links to itself")]
    SelfLink(String),

    #[error("Link '{link}' matches the event name of '{by_event}' and the id of '{by_id}'")]
    AmbiguousLink {
        link: String,
        by_event: String,
        by_id: String,
    },

    #[error("Start link '{0}' does not name a step")]
    UnknownStart(String),

    #[error("Section '{section}' lists unknown step '{step}'")]
    UnknownSectionStep { section: String, step: String },

    #[error("Step '{step}' targets object '{target}' which is not registered")]
    UnresolvedTarget { step: String, target: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Object not found: {0}")]
    NotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompareError {
    #[error("Cannot compare {left} with {right}")]
    TypeMismatch { left: String, right: String },
}
