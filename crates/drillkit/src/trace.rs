use drillcore::FlowEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// One-line, human readable form of a telemetry record
pub fn describe(event: &FlowEvent) -> String {
    match event {
        FlowEvent::GraphStarted { graph_name, .. } => format!("▶️  Graph '{}' started", graph_name),
        FlowEvent::StepArmed {
            step_id, target, ..
        } => format!("  👉 {} waiting on '{}'", step_id, target),
        FlowEvent::StepFired {
            step_id,
            event_name,
            ..
        } => format!("  ⚡ {} fired '{}'", step_id, event_name),
        FlowEvent::StepCompleted { step_id, .. } => format!("  ✅ {} completed", step_id),
        FlowEvent::StepHeld { step_id, .. } => format!("  ⏸️  {} holding", step_id),
        FlowEvent::StepStalled {
            step_id, reason, ..
        } => format!("  ❌ {} stalled: {}", step_id, reason),
        FlowEvent::CombineProgress {
            step_id,
            satisfied,
            required,
            ..
        } => format!("  📊 {} {}/{} gathered", step_id, satisfied, required),
        FlowEvent::BranchTaken {
            step_id, outcome, ..
        } => match outcome {
            Some(result) => format!("  🔀 {} condition {}", step_id, result),
            None => format!("  ⚠️  {} condition indeterminate", step_id),
        },
        FlowEvent::GraphRestarted { .. } => "🔁 Graph restarted".to_string(),
        FlowEvent::GraphTornDown { .. } => "⏹️  Graph torn down".to_string(),
    }
}

/// Print telemetry to stdout until the channel closes or the task is
/// aborted.
pub fn spawn_printer(mut events: broadcast::Receiver<FlowEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("{}", describe(&event)),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!("Telemetry printer skipped {} events", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
