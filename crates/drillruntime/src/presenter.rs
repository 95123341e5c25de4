use drillcore::{ObjectHandle, Step};

/// Receives a step's content payload
pub trait Presenter: Send {
    fn present(&mut self, step: &Step);

    /// A gate was armed on `target` for `step`.
    fn highlight(&mut self, _step: &Step, _target: ObjectHandle) {}

    /// The flow was restarted or torn down.
    fn reset(&mut self) {}
}

pub struct NoopPresenter;

impl Presenter for NoopPresenter {
    fn present(&mut self, _step: &Step) {}
}
