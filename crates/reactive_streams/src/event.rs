use std::fmt::{Display, Formatter};

/// Something that happened on a stream.
///
/// `Failed`, `Completed` and `Interrupted` are terminal: at most one of them is ever delivered to
/// an observer, and nothing follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<V, E> {
    Value(V),
    Failed(E),
    Completed,
    /// The execution was disposed before it completed or failed.
    Interrupted,
}

impl<V, E> Event<V, E> {
    pub fn is_terminating(&self) -> bool {
        !matches!(self, Event::Value(_))
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            Event::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&E> {
        match self {
            Event::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn map<U>(self, transform: impl FnOnce(V) -> U) -> Event<U, E> {
        match self {
            Event::Value(value) => Event::Value(transform(value)),
            Event::Failed(error) => Event::Failed(error),
            Event::Completed => Event::Completed,
            Event::Interrupted => Event::Interrupted,
        }
    }

    pub fn map_error<F>(self, transform: impl FnOnce(E) -> F) -> Event<V, F> {
        match self {
            Event::Value(value) => Event::Value(value),
            Event::Failed(error) => Event::Failed(transform(error)),
            Event::Completed => Event::Completed,
            Event::Interrupted => Event::Interrupted,
        }
    }

    /// A short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Event::Value(_) => "value",
            Event::Failed(_) => "failed",
            Event::Completed => "completed",
            Event::Interrupted => "interrupted",
        }
    }
}

impl<V: Display, E: Display> Display for Event<V, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Event::Value(value) => write!(f, "value: {}", value),
            Event::Failed(error) => write!(f, "failed: {}", error),
            Event::Completed => f.write_str("completed"),
            Event::Interrupted => f.write_str("interrupted"),
        }
    }
}
