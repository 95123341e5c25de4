//! Flow execution runtime
//!
//! This crate provides the scene object registry, graph loading and
//! validation, interaction gates, and the engine that walks a graph step by
//! step as the learner interacts with props.

mod config;
mod engine;
mod gate;
mod loader;
mod presenter;
mod registry;
mod runtime;

pub use config::RuntimeConfig;
pub use engine::{
    EngineServices, FlowEngine, ProgressReport, SectionProgress, StallReason, StepProgress,
    StepStatus,
};
pub use gate::{GateCompleter, GateTicket, InteractionGate, ManualGate};
pub use loader::{load_graph, parse_graph, validate, CompiledGraph, SectionIndex};
pub use presenter::{NoopPresenter, Presenter};
pub use registry::ObjectRegistry;
pub use runtime::FlowRuntime;
