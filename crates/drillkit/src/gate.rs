use drillruntime::{GateCompleter, GateTicket, InteractionGate};
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

/// Completes every gate as soon as it is armed. Useful for unattended
/// playthroughs where every prop is "touched" in arming order.
#[derive(Default)]
pub struct AutoGate {
    completed: usize,
}

impl AutoGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn completed(&self) -> usize {
        self.completed
    }
}

impl InteractionGate for AutoGate {
    fn arm(&mut self, target_name: &str, completer: GateCompleter) {
        tracing::debug!("Auto-completing {} on '{}'", completer.ticket(), target_name);
        if completer.complete() {
            self.completed += 1;
        }
    }
}

/// Completes each gate after a fixed delay on the tokio runtime.
///
/// Must be armed from within a runtime. Disarming aborts the pending timer.
pub struct DelayedGate {
    delay: Duration,
    pending: HashMap<GateTicket, JoinHandle<()>>,
}

impl DelayedGate {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay: Duration::from_millis(delay_ms),
            pending: HashMap::new(),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending
            .values()
            .filter(|task| !task.is_finished())
            .count()
    }
}

impl InteractionGate for DelayedGate {
    fn arm(&mut self, target_name: &str, completer: GateCompleter) {
        tracing::debug!(
            "Completing {} on '{}' in {}ms",
            completer.ticket(),
            target_name,
            self.delay.as_millis()
        );
        let ticket = completer.ticket();
        let delay = self.delay;
        let task = tokio::spawn(async move {
            sleep(delay).await;
            completer.complete();
        });
        self.pending.retain(|_, task| !task.is_finished());
        self.pending.insert(ticket, task);
    }

    fn disarm(&mut self, ticket: GateTicket) {
        if let Some(task) = self.pending.remove(&ticket) {
            task.abort();
        }
    }
}

impl Drop for DelayedGate {
    fn drop(&mut self) {
        for (_, task) in self.pending.drain() {
            task.abort();
        }
    }
}
