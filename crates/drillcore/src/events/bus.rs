use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};

/// Callback invoked with the name of the published event
pub type Handler = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Synchronous named-event dispatch.
///
/// Handlers for a name run in registration order on the publishing thread.
/// The handler list is snapshotted before dispatch, so handlers may
/// subscribe or unsubscribe while an event is being delivered. A handler
/// must not publish the event it is handling; other threads may publish
/// the same name concurrently.
pub struct EventBus {
    handlers: RwLock<HashMap<String, Vec<(SubscriptionId, Handler)>>>,
    dispatching: Mutex<Vec<(ThreadId, String)>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            dispatching: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe<F>(&self, event_name: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let event_name = event_name.into();
        tracing::debug!("Subscribing {:?} to '{}'", id, event_name);
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(event_name)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut removed = false;
        handlers.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|(sub, _)| *sub != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        removed
    }

    /// Invoke every current subscriber of `event_name` and return how many
    /// ran. Publishing a name nobody listens to is a no-op.
    pub fn publish(&self, event_name: &str) -> usize {
        if event_name.is_empty() {
            return 0;
        }

        let Some(_guard) = DispatchGuard::enter(&self.dispatching, event_name) else {
            debug_assert!(
                false,
                "event '{}' published from one of its own handlers",
                event_name
            );
            tracing::error!("Dropping reentrant publish of '{}'", event_name);
            return 0;
        };

        let snapshot: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_name)
            .map(|subs| subs.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        if snapshot.is_empty() {
            tracing::debug!("No subscribers for '{}'", event_name);
        }
        for handler in &snapshot {
            handler(event_name);
        }

        snapshot.len()
    }

    pub fn subscriber_count(&self, event_name: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(event_name)
            .map_or(0, Vec::len)
    }

    /// Drop every subscription (scene teardown).
    pub fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks `name` as being dispatched on the current thread until dropped,
/// including when a handler panics.
struct DispatchGuard<'a> {
    dispatching: &'a Mutex<Vec<(ThreadId, String)>>,
    thread: ThreadId,
    name: String,
}

impl<'a> DispatchGuard<'a> {
    /// `None` when this thread is already dispatching `name`.
    fn enter(dispatching: &'a Mutex<Vec<(ThreadId, String)>>, name: &str) -> Option<Self> {
        let thread = thread::current().id();
        let mut active = dispatching.lock().unwrap_or_else(PoisonError::into_inner);
        if active.iter().any(|(t, n)| *t == thread && n == name) {
            return None;
        }
        active.push((thread, name.to_string()));
        Some(Self {
            dispatching,
            thread,
            name: name.to_string(),
        })
    }
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        let mut active = self
            .dispatching
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(pos) = active
            .iter()
            .rposition(|(t, n)| *t == self.thread && *n == self.name)
        {
            active.remove(pos);
        }
    }
}
