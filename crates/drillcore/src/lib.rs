//! Core abstractions for guided training flows
//!
//! This crate holds the authored data model (steps, graphs, linked object
//! references), the named-event bus, the comparison evaluator used by
//! condition steps, and the telemetry event types. It knows nothing about
//! how scene objects are registered or how gates are armed.

mod compare;
mod error;
pub mod events;
mod graph;
mod object;
mod step;
mod value;

pub use compare::{evaluate, Compare};
pub use error::{AuthoringError, CompareError, FlowError, RegistryError};
pub use events::*;
pub use graph::{FlowGraph, GraphId, Section};
pub use object::{LinkedObjectRef, ObjectHandle, ObjectLookup};
pub use step::{
    Condition, EndAction, Fallback, MediaCue, OperandSource, Step, StepContent, StepId,
};
pub use value::Operand;

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
