use crate::gate::{GateCompleter, GateTicket, InteractionGate};
use crate::loader::CompiledGraph;
use crate::presenter::{NoopPresenter, Presenter};
use crate::registry::ObjectRegistry;
use drillcore::{
    evaluate, EndAction, EventBus, EventEmitter, Fallback, FlowError, ObjectHandle, Operand,
    OperandSource, SessionId, Step,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use tokio::sync::{mpsc, watch};

/// Lifecycle of a single step within one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Pending,
    AwaitingInteraction,
    Firing,
    AwaitingCombine,
    /// Fired with `EndAction::Hold`; waits for an explicit resume.
    Held,
    Completed,
    Stalled(StallReason),
}

impl StepStatus {
    pub fn has_fired(&self) -> bool {
        matches!(
            self,
            StepStatus::Firing
                | StepStatus::AwaitingCombine
                | StepStatus::Held
                | StepStatus::Completed
        )
    }

    pub fn is_stalled(&self) -> bool {
        matches!(self, StepStatus::Stalled(_))
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::AwaitingInteraction => write!(f, "awaiting interaction"),
            StepStatus::Firing => write!(f, "firing"),
            StepStatus::AwaitingCombine => write!(f, "awaiting combine"),
            StepStatus::Held => write!(f, "held"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Stalled(reason) => write!(f, "stalled ({})", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StallReason {
    UnresolvedReference { target: String },
    IndeterminateCondition { detail: String },
}

impl fmt::Display for StallReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StallReason::UnresolvedReference { target } => {
                write!(f, "object '{}' is not registered", target)
            }
            StallReason::IndeterminateCondition { detail } => {
                write!(f, "condition indeterminate: {}", detail)
            }
        }
    }
}

/// Shared scene services an engine runs against
#[derive(Clone)]
pub struct EngineServices {
    pub registry: Arc<ObjectRegistry>,
    pub bus: Arc<EventBus>,
    pub emitter: EventEmitter,
}

/// Stored continuation for an armed gate
#[derive(Debug, Clone, Copy)]
enum Wait {
    Interaction { step: usize },
    Combine { owner: usize, member: usize },
}

/// An engine's gate and its stored continuations. Shared with the runtime
/// so unloading the scene can release them while the engine is elsewhere.
pub(crate) struct SessionGates {
    gate: Box<dyn InteractionGate>,
    waits: BTreeMap<GateTicket, Wait>,
    closed: watch::Sender<bool>,
}

impl SessionGates {
    /// Returns false without arming once the scene is closed.
    fn arm(&mut self, wait: Wait, target: &str, completer: GateCompleter) -> bool {
        if *self.closed.borrow() {
            return false;
        }
        self.waits.insert(completer.ticket(), wait);
        self.gate.arm(target, completer);
        true
    }

    fn release(&mut self) {
        for ticket in std::mem::take(&mut self.waits).into_keys() {
            self.gate.disarm(ticket);
        }
    }

    /// Release every gate and refuse to arm again.
    pub(crate) fn close(&mut self) {
        self.release();
        self.closed.send_replace(true);
    }
}

#[derive(Debug)]
struct CombineWait {
    members: Vec<usize>,
    satisfied: Vec<bool>,
}

#[derive(Debug, Clone, Copy)]
enum Action {
    Activate { step: usize, satisfied: bool },
    Fire(usize),
}

/// Drives one authored graph through its steps.
///
/// The engine never blocks: waiting for an interaction is a stored
/// continuation keyed by gate ticket. Gate completions are queued and
/// handled by [`FlowEngine::pump`] (or [`FlowEngine::next_signal`]) on the
/// host's own thread, so for a fixed graph and a fixed order of completions
/// the published event sequence is always the same.
pub struct FlowEngine {
    session_id: SessionId,
    graph: Arc<CompiledGraph>,
    steps: Vec<Step>,
    status: Vec<StepStatus>,
    registry: Arc<ObjectRegistry>,
    bus: Arc<EventBus>,
    emitter: EventEmitter,
    gates: Arc<Mutex<SessionGates>>,
    closed: watch::Receiver<bool>,
    presenter: Box<dyn Presenter>,
    signals_tx: mpsc::UnboundedSender<GateTicket>,
    signals_rx: mpsc::UnboundedReceiver<GateTicket>,
    combines: BTreeMap<usize, CombineWait>,
    held: BTreeMap<usize, Vec<usize>>,
    queue: VecDeque<Action>,
    variables: HashMap<String, Operand>,
    published: Vec<String>,
    current: Option<usize>,
    next_ticket: u64,
    started: bool,
    torn_down: bool,
}

impl FlowEngine {
    pub fn new(
        graph: Arc<CompiledGraph>,
        services: EngineServices,
        gate: Box<dyn InteractionGate>,
    ) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed) = watch::channel(false);
        // Working copy: only the resolved-reference caches change at runtime.
        let steps = graph.steps().to_vec();
        let status = vec![StepStatus::Pending; steps.len()];
        Self {
            session_id: services.emitter.session_id(),
            graph,
            steps,
            status,
            registry: services.registry,
            bus: services.bus,
            emitter: services.emitter,
            gates: Arc::new(Mutex::new(SessionGates {
                gate,
                waits: BTreeMap::new(),
                closed: closed_tx,
            })),
            closed,
            presenter: Box::new(NoopPresenter),
            signals_tx,
            signals_rx,
            combines: BTreeMap::new(),
            held: BTreeMap::new(),
            queue: VecDeque::new(),
            variables: HashMap::new(),
            published: Vec::new(),
            current: None,
            next_ticket: 1,
            started: false,
            torn_down: false,
        }
    }

    pub fn with_presenter(mut self, presenter: Box<dyn Presenter>) -> Self {
        self.presenter = presenter;
        self
    }

    pub(crate) fn session_gates(&self) -> Weak<Mutex<SessionGates>> {
        Arc::downgrade(&self.gates)
    }

    /// Activate the graph's start steps in order.
    pub fn start(&mut self) {
        if self.sync_scene() {
            tracing::warn!("Session {} was torn down; not starting", self.session_id);
            return;
        }
        if self.started {
            tracing::debug!("Session {} already started", self.session_id);
            return;
        }
        self.started = true;

        tracing::info!(
            "Starting graph '{}' (session {})",
            self.graph.name(),
            self.session_id
        );
        self.emitter
            .graph_started(self.graph.id(), self.graph.name());

        for &step in self.graph.starts() {
            self.queue.push_back(Action::Activate {
                step,
                satisfied: false,
            });
        }
        self.run_queue();
    }

    /// Activate a pending step by event name or id. Does not count as
    /// starting the graph.
    pub fn activate(&mut self, name: &str) -> Result<(), FlowError> {
        let step = self.index_of(name)?;
        if self.sync_scene() {
            return Ok(());
        }
        self.queue.push_back(Action::Activate {
            step,
            satisfied: false,
        });
        self.run_queue();
        Ok(())
    }

    /// Release a held step and advance to the successors chosen when it fired.
    pub fn resume(&mut self, name: &str) -> Result<(), FlowError> {
        let step = self.index_of(name)?;
        if self.sync_scene() {
            tracing::debug!("Session {} is torn down; not resuming", self.session_id);
            return Ok(());
        }
        if self.status[step] != StepStatus::Held {
            return Err(FlowError::NotHeld {
                step: self.steps[step].id.clone(),
                status: self.status[step].to_string(),
            });
        }
        let successors = self.held.remove(&step).unwrap_or_default();
        self.complete(step);
        for next in successors {
            self.queue.push_back(Action::Activate {
                step: next,
                satisfied: false,
            });
        }
        self.run_queue();
        Ok(())
    }

    /// Drop all run state, variables included, and start again from the
    /// start steps. An engine whose scene was unloaded stays torn down.
    pub fn restart(&mut self) {
        if *self.closed.borrow() {
            self.sync_scene();
            tracing::warn!(
                "Scene of session {} was unloaded; not restarting",
                self.session_id
            );
            return;
        }
        tracing::info!(
            "Restarting graph '{}' (session {})",
            self.graph.name(),
            self.session_id
        );
        self.release_gates();
        while self.signals_rx.try_recv().is_ok() {}
        self.queue.clear();
        self.combines.clear();
        self.held.clear();
        self.variables.clear();
        self.published.clear();
        self.current = None;
        self.status.fill(StepStatus::Pending);
        self.presenter.reset();
        self.emitter.graph_restarted();
        self.started = false;
        self.torn_down = false;
        self.start();
    }

    /// Release every armed gate and pending continuation. The engine does
    /// nothing afterwards until restarted.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        tracing::info!("Tearing down session {}", self.session_id);
        self.release_gates();
        self.queue.clear();
        self.combines.clear();
        self.held.clear();
        self.torn_down = true;
        self.presenter.reset();
        self.emitter.graph_torn_down();
    }

    /// Handle every gate completion reported so far. Returns how many were
    /// handled.
    pub fn pump(&mut self) -> usize {
        if self.sync_scene() {
            return 0;
        }
        let mut handled = 0;
        while let Ok(ticket) = self.signals_rx.try_recv() {
            self.handle_signal(ticket);
            self.run_queue();
            handled += 1;
        }
        handled
    }

    /// Wait for the next gate completion and handle it. Returns false at
    /// once when no gate is armed, and when the engine is torn down while
    /// waiting.
    pub async fn next_signal(&mut self) -> bool {
        if self.sync_scene() || self.is_idle() {
            return false;
        }
        let ticket = tokio::select! {
            ticket = self.signals_rx.recv() => ticket,
            _ = self.closed.changed() => None,
        };
        match ticket {
            Some(ticket) => {
                self.handle_signal(ticket);
                self.run_queue();
                true
            }
            None => {
                self.sync_scene();
                false
            }
        }
    }

    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Operand>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn variable(&self, name: &str) -> Option<&Operand> {
        self.variables.get(name)
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn graph(&self) -> &CompiledGraph {
        &self.graph
    }

    pub fn status(&self, name: &str) -> Option<&StepStatus> {
        self.graph.index_of(name).map(|idx| &self.status[idx])
    }

    /// The step that fired most recently.
    pub fn current_step(&self) -> Option<&Step> {
        self.current.map(|idx| &self.steps[idx])
    }

    /// Every event name published so far, in order.
    pub fn published(&self) -> &[String] {
        &self.published
    }

    pub fn armed_gates(&self) -> usize {
        self.gates().waits.len()
    }

    /// True when no gate is armed, so no interaction can move the flow.
    pub fn is_idle(&self) -> bool {
        self.gates().waits.is_empty()
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down || *self.closed.borrow()
    }

    pub fn report(&self) -> ProgressReport {
        let steps = self
            .steps
            .iter()
            .zip(&self.status)
            .map(|(step, status)| StepProgress {
                id: step.id.clone(),
                event_name: step.event_name.clone(),
                status: status.clone(),
            })
            .collect();
        let sections = self
            .graph
            .sections()
            .iter()
            .map(|section| SectionProgress {
                name: section.name.clone(),
                completed: section
                    .steps
                    .iter()
                    .filter(|&&idx| self.status[idx].has_fired())
                    .count(),
                total: section.steps.len(),
            })
            .collect();
        ProgressReport {
            session_id: self.session_id,
            graph_name: self.graph.name().to_string(),
            published: self.published.clone(),
            steps,
            sections,
        }
    }

    fn gates(&self) -> MutexGuard<'_, SessionGates> {
        self.gates.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Finish tearing down if the runtime unloaded the scene. Returns true
    /// when the engine is torn down.
    fn sync_scene(&mut self) -> bool {
        if *self.closed.borrow() && !self.torn_down {
            tracing::info!("Scene of session {} was unloaded", self.session_id);
            self.teardown();
        }
        self.torn_down
    }

    fn index_of(&self, name: &str) -> Result<usize, FlowError> {
        self.graph
            .index_of(name)
            .ok_or_else(|| FlowError::UnknownStep(name.to_string()))
    }

    fn run_queue(&mut self) {
        while let Some(action) = self.queue.pop_front() {
            match action {
                Action::Activate { step, satisfied } => self.enter(step, satisfied),
                Action::Fire(step) => self.fire(step),
            }
        }
    }

    fn enter(&mut self, idx: usize, satisfied: bool) {
        if self.status[idx] != StepStatus::Pending {
            tracing::debug!(
                "Step '{}' already activated ({})",
                self.steps[idx].id,
                self.status[idx]
            );
            return;
        }

        if let Some(name) = self.steps[idx].enter_event_name.clone() {
            self.publish(&name);
        }

        if satisfied || self.steps[idx].interactive_target.is_none() {
            self.fire(idx);
            return;
        }

        match self.resolve_target(idx) {
            Ok((handle, target)) => {
                self.status[idx] = StepStatus::AwaitingInteraction;
                self.arm(Wait::Interaction { step: idx }, idx, handle, &target);
            }
            Err(target) => self.stall(idx, StallReason::UnresolvedReference { target }),
        }
    }

    fn fire(&mut self, idx: usize) {
        self.status[idx] = StepStatus::Firing;
        self.current = Some(idx);

        let step_id = self.steps[idx].id.clone();
        let event_name = self.steps[idx].event_name.clone();
        let exit_event = self.steps[idx].exit_event_name.clone();
        let end_action = self.steps[idx].end_action;

        self.presenter.present(&self.steps[idx]);
        self.publish(&event_name);
        tracing::info!("Step '{}' fired '{}'", step_id, event_name);
        self.emitter.step_fired(&step_id, &event_name);
        if let Some(exit) = exit_event {
            self.publish(&exit);
        }

        let Some(successors) = self.branch(idx) else {
            return;
        };

        match end_action {
            EndAction::NextEvent => {
                self.complete(idx);
                for next in successors {
                    self.queue.push_back(Action::Activate {
                        step: next,
                        satisfied: false,
                    });
                }
            }
            EndAction::Hold => {
                tracing::info!("Step '{}' holding", step_id);
                self.status[idx] = StepStatus::Held;
                self.held.insert(idx, successors);
                self.emitter.step_held(&step_id);
            }
            EndAction::HoldForCombine => self.begin_combine(idx, successors),
        }
    }

    /// Pick the successor set; `None` when the step stalled instead.
    fn branch(&mut self, idx: usize) -> Option<Vec<usize>> {
        let Some(condition) = self.steps[idx].condition.clone() else {
            return Some(self.graph.links(idx).to_vec());
        };

        let outcome = self.operand(&condition.left).and_then(|left| {
            let right = self.operand(&condition.right)?;
            Ok(evaluate(condition.compare, &left, &right)?)
        });

        let step_id = self.steps[idx].id.clone();
        match outcome {
            Ok(result) => {
                tracing::debug!(
                    "Condition on '{}' ({}) is {}",
                    step_id,
                    condition.compare.symbol(),
                    result
                );
                self.emitter.branch_taken(&step_id, Some(result));
                if result {
                    Some(self.graph.links(idx).to_vec())
                } else {
                    Some(self.graph.false_links(idx).to_vec())
                }
            }
            Err(e) => {
                tracing::warn!("Condition on step '{}' is indeterminate: {}", step_id, e);
                self.emitter.branch_taken(&step_id, None);
                match condition.fallback {
                    Fallback::WhenFalse => Some(self.graph.false_links(idx).to_vec()),
                    Fallback::Stall => {
                        self.stall(
                            idx,
                            StallReason::IndeterminateCondition {
                                detail: e.to_string(),
                            },
                        );
                        None
                    }
                }
            }
        }
    }

    fn operand(&self, source: &OperandSource) -> Result<Operand, FlowError> {
        match source {
            OperandSource::Literal(value) => Ok(value.clone()),
            OperandSource::Variable(name) => self
                .variables
                .get(name)
                .cloned()
                .ok_or_else(|| FlowError::UnknownVariable(name.clone())),
        }
    }

    fn begin_combine(&mut self, idx: usize, successors: Vec<usize>) {
        let mut satisfied = Vec::with_capacity(successors.len());
        let mut to_arm = Vec::new();
        for (member, &next) in successors.iter().enumerate() {
            if self.steps[next].interactive_target.is_none() {
                satisfied.push(true);
                continue;
            }
            match self.resolve_target(next) {
                Ok((handle, target)) => {
                    satisfied.push(false);
                    to_arm.push((member, next, handle, target));
                }
                Err(target) => {
                    self.stall(idx, StallReason::UnresolvedReference { target });
                    return;
                }
            }
        }

        let required = successors.len();
        if to_arm.is_empty() {
            self.finish_combine(idx, successors);
            return;
        }

        self.status[idx] = StepStatus::AwaitingCombine;
        let done = satisfied.iter().filter(|s| **s).count();
        self.combines.insert(
            idx,
            CombineWait {
                members: successors,
                satisfied,
            },
        );
        for (member, next, handle, target) in to_arm {
            self.arm(Wait::Combine { owner: idx, member }, next, handle, &target);
        }
        self.emitter
            .combine_progress(&self.steps[idx].id, done, required);
    }

    fn finish_combine(&mut self, idx: usize, members: Vec<usize>) {
        self.complete(idx);
        for next in members {
            self.queue.push_back(Action::Activate {
                step: next,
                satisfied: true,
            });
        }
    }

    fn handle_signal(&mut self, ticket: GateTicket) {
        let Some(wait) = self.gates().waits.remove(&ticket) else {
            tracing::debug!("Ignoring stale {}", ticket);
            return;
        };

        match wait {
            Wait::Interaction { step } => {
                if self.status[step] == StepStatus::AwaitingInteraction {
                    self.queue.push_back(Action::Fire(step));
                }
            }
            Wait::Combine { owner, member } => {
                let Some(combine) = self.combines.get_mut(&owner) else {
                    return;
                };
                combine.satisfied[member] = true;
                let done = combine.satisfied.iter().filter(|s| **s).count();
                let required = combine.satisfied.len();
                tracing::debug!(
                    "Combine on '{}': {}/{} satisfied",
                    self.steps[owner].id,
                    done,
                    required
                );
                self.emitter
                    .combine_progress(&self.steps[owner].id, done, required);
                if done == required {
                    if let Some(combine) = self.combines.remove(&owner) {
                        self.finish_combine(owner, combine.members);
                    }
                }
            }
        }
    }

    /// Resolve a step's interactive target, refreshing its cached handle.
    /// On failure returns the unresolved name.
    fn resolve_target(&mut self, idx: usize) -> Result<(ObjectHandle, String), String> {
        let registry = Arc::clone(&self.registry);
        let Some(target) = self.steps[idx].interactive_target.as_mut() else {
            return Err(String::new());
        };
        let name = target.display_name.clone();
        match target.resolve(registry.as_ref()) {
            Ok(handle) => Ok((handle, name)),
            Err(_) => Err(name),
        }
    }

    fn arm(&mut self, wait: Wait, step: usize, handle: ObjectHandle, target: &str) {
        let ticket = GateTicket(self.next_ticket);
        self.next_ticket += 1;

        let completer = GateCompleter::new(ticket, handle, self.signals_tx.clone());
        if !self.gates().arm(wait, target, completer) {
            tracing::debug!("Scene closed; not arming '{}'", target);
            return;
        }
        tracing::debug!(
            "Armed {} on '{}' for step '{}'",
            ticket,
            target,
            self.steps[step].id
        );
        self.presenter.highlight(&self.steps[step], handle);
        self.emitter.step_armed(&self.steps[step].id, target);
    }

    fn complete(&mut self, idx: usize) {
        self.status[idx] = StepStatus::Completed;
        self.emitter.step_completed(&self.steps[idx].id);
    }

    fn stall(&mut self, idx: usize, reason: StallReason) {
        tracing::warn!(
            "Step '{}' ('{}') stalled: {}",
            self.steps[idx].id,
            self.steps[idx].event_name,
            reason
        );
        self.emitter
            .step_stalled(&self.steps[idx].id, reason.to_string());
        self.status[idx] = StepStatus::Stalled(reason);
    }

    fn publish(&mut self, event_name: &str) {
        if event_name.is_empty() {
            return;
        }
        self.bus.publish(event_name);
        self.published.push(event_name.to_string());
    }

    fn release_gates(&mut self) {
        self.gates().release();
    }
}

impl Drop for FlowEngine {
    fn drop(&mut self) {
        self.release_gates();
    }
}

/// Snapshot of a run's progress
#[derive(Debug, Clone)]
pub struct ProgressReport {
    pub session_id: SessionId,
    pub graph_name: String,
    pub published: Vec<String>,
    pub steps: Vec<StepProgress>,
    pub sections: Vec<SectionProgress>,
}

#[derive(Debug, Clone)]
pub struct StepProgress {
    pub id: String,
    pub event_name: String,
    pub status: StepStatus,
}

#[derive(Debug, Clone)]
pub struct SectionProgress {
    pub name: String,
    pub completed: usize,
    pub total: usize,
}

impl SectionProgress {
    pub fn is_complete(&self) -> bool {
        self.completed == self.total
    }
}
