use drillcore::{ObjectHandle, Step};
use drillruntime::Presenter;
use std::sync::{Arc, Mutex, PoisonError};

/// Writes each step's content to the log
pub struct TracingPresenter;

impl Presenter for TracingPresenter {
    fn present(&mut self, step: &Step) {
        let content = &step.content;
        match &content.text {
            Some(text) => tracing::info!("[{}] {}", step.id, text),
            None => tracing::info!("[{}] {}", step.id, step.event_name),
        }
        if let Some(tip) = &content.hand_tip {
            tracing::info!("[{}] tip: {}", step.id, tip);
        }
        if let Some(voice) = &content.voice {
            tracing::debug!("[{}] voice cue '{}'", step.id, voice.name);
        }
        for timeline in content
            .camera_timeline
            .iter()
            .chain(&content.object_timeline)
        {
            tracing::debug!("[{}] timeline '{}'", step.id, timeline.name);
        }
        for timeline in &content.timelines {
            tracing::debug!("[{}] timeline '{}'", step.id, timeline);
        }
    }

    fn highlight(&mut self, step: &Step, target: ObjectHandle) {
        if let Some(name) = step.target_name() {
            tracing::info!("[{}] waiting on '{}' ({})", step.id, name, target);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenterCall {
    Present { step_id: String },
    Highlight { step_id: String, target: ObjectHandle },
    Reset,
}

/// Keeps every call it receives. Clones share one journal.
#[derive(Clone, Default)]
pub struct RecordingPresenter {
    calls: Arc<Mutex<Vec<PresenterCall>>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<PresenterCall> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Ids of presented steps, in order.
    pub fn presented(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PresenterCall::Present { step_id } => Some(step_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PresenterCall) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

impl Presenter for RecordingPresenter {
    fn present(&mut self, step: &Step) {
        self.record(PresenterCall::Present {
            step_id: step.id.clone(),
        });
    }

    fn highlight(&mut self, step: &Step, target: ObjectHandle) {
        self.record(PresenterCall::Highlight {
            step_id: step.id.clone(),
            target,
        });
    }

    fn reset(&mut self) {
        self.record(PresenterCall::Reset);
    }
}
