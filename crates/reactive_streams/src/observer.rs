use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::event::Event;

type Action<V, E> = Arc<dyn Fn(Event<V, E>) + Send + Sync>;

/// A sink for [`Event`]s.
///
/// An observer is nothing more than a shared callback; it holds no state of its own. The
/// "nothing after a terminal event" rule is enforced by the [`Signal`](crate::Signal) that
/// delivers to it, not here.
///
/// Cloning an observer is cheap and the clones feed the same callback.
pub struct Observer<V, E> {
    action: Action<V, E>,
}

impl<V, E> Observer<V, E> {
    pub fn new(action: impl Fn(Event<V, E>) + Send + Sync + 'static) -> Self {
        Self {
            action: Arc::new(action),
        }
    }

    /// An observer that only cares about values.
    pub fn on_value(action: impl Fn(V) + Send + Sync + 'static) -> Self {
        Self::new(move |event| {
            if let Event::Value(value) = event {
                action(value)
            }
        })
    }

    /// An observer that ignores everything.
    pub fn noop() -> Self {
        Self::new(|_| {})
    }

    pub fn send(&self, event: Event<V, E>) {
        (self.action)(event)
    }

    pub fn send_value(&self, value: V) {
        self.send(Event::Value(value))
    }

    pub fn send_failed(&self, error: E) {
        self.send(Event::Failed(error))
    }

    pub fn send_completed(&self) {
        self.send(Event::Completed)
    }

    pub fn send_interrupted(&self) {
        self.send(Event::Interrupted)
    }
}

impl<V, E> Clone for Observer<V, E> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
        }
    }
}

impl<V, E> Default for Observer<V, E> {
    fn default() -> Self {
        Self::noop()
    }
}

impl<V, E> Debug for Observer<V, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observer")
            .finish_non_exhaustive()
    }
}
