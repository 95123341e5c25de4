use drillcore::ObjectHandle;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GateTicket(pub(crate) u64);

impl fmt::Display for GateTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gate-{}", self.0)
    }
}

/// One-shot completion callback for an armed gate.
///
/// Completing consumes the value, so a gate reports at most once. The
/// signal is queued for the engine and handled on its next pump.
#[derive(Debug)]
pub struct GateCompleter {
    ticket: GateTicket,
    target: ObjectHandle,
    sender: mpsc::UnboundedSender<GateTicket>,
}

impl GateCompleter {
    pub(crate) fn new(
        ticket: GateTicket,
        target: ObjectHandle,
        sender: mpsc::UnboundedSender<GateTicket>,
    ) -> Self {
        Self {
            ticket,
            target,
            sender,
        }
    }

    pub fn ticket(&self) -> GateTicket {
        self.ticket
    }

    pub fn target(&self) -> ObjectHandle {
        self.target
    }

    /// Report the interaction. Returns false if the engine is gone.
    pub fn complete(self) -> bool {
        self.sender.send(self.ticket).is_ok()
    }
}

/// Input collaborator that detects learner interaction with a prop
pub trait InteractionGate: Send {
    fn arm(&mut self, target_name: &str, completer: GateCompleter);

    /// Release a gate that will never be waited on again.
    fn disarm(&mut self, _ticket: GateTicket) {}
}

struct ArmedGate {
    target_name: String,
    completer: GateCompleter,
}

/// Gate driven by explicit calls to [`ManualGate::interact`].
///
/// Clones share the same armed set, so the host keeps one clone and hands
/// another to the engine.
#[derive(Clone, Default)]
pub struct ManualGate {
    armed: Arc<Mutex<Vec<ArmedGate>>>,
}

impl ManualGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report an interaction with `target_name`, completing every gate
    /// armed on it. Returns how many gates completed.
    pub fn interact(&self, target_name: &str) -> usize {
        let fired: Vec<GateCompleter> = {
            let mut armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
            let (hit, keep): (Vec<ArmedGate>, Vec<ArmedGate>) = armed
                .drain(..)
                .partition(|g| g.target_name == target_name);
            *armed = keep;
            hit.into_iter().map(|g| g.completer).collect()
        };
        if fired.is_empty() {
            tracing::debug!("Interaction with '{}' but no gate is armed", target_name);
        }
        fired
            .into_iter()
            .map(GateCompleter::complete)
            .filter(|sent| *sent)
            .count()
    }

    pub fn is_armed(&self, target_name: &str) -> bool {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|g| g.target_name == target_name)
    }

    /// Names with at least one armed gate, in arming order.
    pub fn armed_targets(&self) -> Vec<String> {
        let armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = Vec::new();
        for gate in armed.iter() {
            if !names.contains(&gate.target_name) {
                names.push(gate.target_name.clone());
            }
        }
        names
    }
}

impl InteractionGate for ManualGate {
    fn arm(&mut self, target_name: &str, completer: GateCompleter) {
        tracing::debug!("Arming {} on '{}'", completer.ticket(), target_name);
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(ArmedGate {
                target_name: target_name.to_string(),
                completer,
            });
    }

    fn disarm(&mut self, ticket: GateTicket) {
        self.armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|g| g.completer.ticket() != ticket);
    }
}
