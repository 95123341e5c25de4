//! Standard collaborators
//!
//! Presenters, gates, a scoring sink, and telemetry formatting for hosts
//! that drive flows without a full simulation scene.

mod gate;
mod presenter;
mod score;
mod trace;

pub use gate::{AutoGate, DelayedGate};
pub use presenter::{PresenterCall, RecordingPresenter, TracingPresenter};
pub use score::{ScoreRecorder, ScoreRules};
pub use trace::{describe, spawn_printer};

use drillcore::FlowGraph;
use drillruntime::ObjectRegistry;

/// Register a fresh handle for every interactive target the graph names
/// that the registry does not already know. Returns the names added.
pub fn register_props(registry: &ObjectRegistry, graph: &FlowGraph) -> Vec<String> {
    let mut added = Vec::new();
    for name in graph.steps.iter().filter_map(|s| s.target_name()) {
        if !registry.contains(name) {
            registry.register_new(name);
            added.push(name.to_string());
        }
    }
    added
}
