use crate::GraphId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

pub type SessionId = Uuid;

/// Progress records emitted while a graph runs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FlowEvent {
    GraphStarted {
        session_id: SessionId,
        graph_id: GraphId,
        graph_name: String,
        timestamp: DateTime<Utc>,
    },
    StepArmed {
        session_id: SessionId,
        step_id: String,
        target: String,
        timestamp: DateTime<Utc>,
    },
    StepFired {
        session_id: SessionId,
        step_id: String,
        event_name: String,
        timestamp: DateTime<Utc>,
    },
    StepCompleted {
        session_id: SessionId,
        step_id: String,
        timestamp: DateTime<Utc>,
    },
    StepHeld {
        session_id: SessionId,
        step_id: String,
        timestamp: DateTime<Utc>,
    },
    StepStalled {
        session_id: SessionId,
        step_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    CombineProgress {
        session_id: SessionId,
        step_id: String,
        satisfied: usize,
        required: usize,
        timestamp: DateTime<Utc>,
    },
    BranchTaken {
        session_id: SessionId,
        step_id: String,
        /// `None` when the condition was indeterminate.
        outcome: Option<bool>,
        timestamp: DateTime<Utc>,
    },
    GraphRestarted {
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
    GraphTornDown {
        session_id: SessionId,
        timestamp: DateTime<Utc>,
    },
}

impl FlowEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            FlowEvent::GraphStarted { session_id, .. }
            | FlowEvent::StepArmed { session_id, .. }
            | FlowEvent::StepFired { session_id, .. }
            | FlowEvent::StepCompleted { session_id, .. }
            | FlowEvent::StepHeld { session_id, .. }
            | FlowEvent::StepStalled { session_id, .. }
            | FlowEvent::CombineProgress { session_id, .. }
            | FlowEvent::BranchTaken { session_id, .. }
            | FlowEvent::GraphRestarted { session_id, .. }
            | FlowEvent::GraphTornDown { session_id, .. } => *session_id,
        }
    }
}

/// Per-session emitter handed to a flow engine
#[derive(Clone)]
pub struct EventEmitter {
    session_id: SessionId,
    sender: broadcast::Sender<FlowEvent>,
}

impl EventEmitter {
    pub fn new(session_id: SessionId, sender: broadcast::Sender<FlowEvent>) -> Self {
        Self { session_id, sender }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn emit(&self, event: FlowEvent) {
        let _ = self.sender.send(event);
    }

    pub fn graph_started(&self, graph_id: GraphId, graph_name: &str) {
        self.emit(FlowEvent::GraphStarted {
            session_id: self.session_id,
            graph_id,
            graph_name: graph_name.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_armed(&self, step_id: &str, target: &str) {
        self.emit(FlowEvent::StepArmed {
            session_id: self.session_id,
            step_id: step_id.to_string(),
            target: target.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_fired(&self, step_id: &str, event_name: &str) {
        self.emit(FlowEvent::StepFired {
            session_id: self.session_id,
            step_id: step_id.to_string(),
            event_name: event_name.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_completed(&self, step_id: &str) {
        self.emit(FlowEvent::StepCompleted {
            session_id: self.session_id,
            step_id: step_id.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_held(&self, step_id: &str) {
        self.emit(FlowEvent::StepHeld {
            session_id: self.session_id,
            step_id: step_id.to_string(),
            timestamp: Utc::now(),
        });
    }

    pub fn step_stalled(&self, step_id: &str, reason: impl Into<String>) {
        self.emit(FlowEvent::StepStalled {
            session_id: self.session_id,
            step_id: step_id.to_string(),
            reason: reason.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn combine_progress(&self, step_id: &str, satisfied: usize, required: usize) {
        self.emit(FlowEvent::CombineProgress {
            session_id: self.session_id,
            step_id: step_id.to_string(),
            satisfied,
            required,
            timestamp: Utc::now(),
        });
    }

    pub fn branch_taken(&self, step_id: &str, outcome: Option<bool>) {
        self.emit(FlowEvent::BranchTaken {
            session_id: self.session_id,
            step_id: step_id.to_string(),
            outcome,
            timestamp: Utc::now(),
        });
    }

    pub fn graph_restarted(&self) {
        self.emit(FlowEvent::GraphRestarted {
            session_id: self.session_id,
            timestamp: Utc::now(),
        });
    }

    pub fn graph_torn_down(&self) {
        self.emit(FlowEvent::GraphTornDown {
            session_id: self.session_id,
            timestamp: Utc::now(),
        });
    }
}

/// Scene-wide telemetry channel
pub struct Telemetry {
    sender: broadcast::Sender<FlowEvent>,
}

impl Telemetry {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<FlowEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: FlowEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, session_id: SessionId) -> EventEmitter {
        EventEmitter::new(session_id, self.sender.clone())
    }
}
