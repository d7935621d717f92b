//! Cancellation handles.
//!
//! A [`Disposable`] represents work that can be cancelled on demand. Every implementation here
//! guarantees that the release happens exactly once, no matter how many threads race on
//! [`Disposable::dispose`], and that disposing from within another disposal is safe.
//!
//! [`CompositeDisposable`] aggregates children and is the per-execution lifetime handed to a
//! [`Producer`](crate::Producer) body.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::diagnostics;

/// A handle over work that can be cancelled.
pub trait Disposable: Send + Sync {
    /// Releases the underlying resource.
    ///
    /// Idempotent: only the first call has an effect.
    fn dispose(&self);

    /// Whether [`dispose`](Self::dispose) has been called. Never reverts to `false`.
    fn is_disposed(&self) -> bool;
}

/// A shared, type-erased disposable.
pub type AnyDisposable = Arc<dyn Disposable>;

impl<D: Disposable + ?Sized> Disposable for Arc<D> {
    fn dispose(&self) {
        (**self).dispose()
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

impl<D: Disposable + ?Sized> Disposable for Box<D> {
    fn dispose(&self) {
        (**self).dispose()
    }

    fn is_disposed(&self) -> bool {
        (**self).is_disposed()
    }
}

/// A disposable that only tracks whether it has been disposed.
#[derive(Debug, Default)]
pub struct SimpleDisposable {
    disposed: AtomicBool,
}

impl SimpleDisposable {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Disposable for SimpleDisposable {
    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

type Action = Box<dyn FnOnce() + Send>;

/// Runs an action the first time it is disposed.
pub struct ActionDisposable {
    disposed: AtomicBool,
    action: Mutex<Option<Action>>,
}

impl ActionDisposable {
    pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposed: AtomicBool::new(false),
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// Convenience for the common case of handing the disposable straight to a composite.
    pub fn shared(action: impl FnOnce() + Send + 'static) -> AnyDisposable {
        Arc::new(Self::new(action))
    }
}

impl Disposable for ActionDisposable {
    fn dispose(&self) {
        // all callers race on the flag, only the winner runs the action
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        // the lock is released before the action runs, the action may dispose other things
        let action = self.action.lock().take();
        if let Some(action) = action {
            action();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Debug for ActionDisposable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDisposable")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// An unordered collection of disposables that are disposed together.
///
/// Once the composite has been disposed, any child added afterwards is disposed synchronously
/// inside [`add`](Self::add) and never retained, so there is no window in which a late child
/// can leak or be disposed twice.
pub struct CompositeDisposable {
    disposed: AtomicBool,
    /// `None` once disposed. The add-after-dispose check happens under this lock.
    children: Mutex<Option<Vec<AnyDisposable>>>,
}

impl CompositeDisposable {
    pub fn new() -> Self {
        diagnostics::record_composite_created();
        Self {
            disposed: AtomicBool::new(false),
            children: Mutex::new(Some(Vec::new())),
        }
    }

    /// Retains `disposable` until this composite is disposed.
    ///
    /// If the composite is already disposed, `disposable` is disposed immediately instead.
    pub fn add(&self, disposable: AnyDisposable) {
        let rejected = {
            let mut children = self.children.lock();
            match children.as_mut() {
                Some(children) => {
                    children.push(disposable);
                    None
                }
                None => Some(disposable),
            }
        };

        if let Some(disposable) = rejected {
            disposable.dispose();
        }
    }

    /// Retains an action to run when this composite is disposed.
    pub fn add_action(&self, action: impl FnOnce() + Send + 'static) {
        self.add(ActionDisposable::shared(action));
    }

    /// The number of children currently retained, `0` once disposed.
    pub fn len(&self) -> usize {
        self.children
            .lock()
            .as_ref()
            .map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for CompositeDisposable {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for CompositeDisposable {
    fn dispose(&self) {
        let children = {
            let mut children = self.children.lock();
            let taken = children.take();
            if taken.is_some() {
                self.disposed.store(true, Ordering::Release);
            }
            taken
        };

        let Some(children) = children else {
            return;
        };

        debug!("Disposing composite. children: {}", children.len());
        for child in children {
            child.dispose();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Debug for CompositeDisposable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeDisposable")
            .field("disposed", &self.is_disposed())
            .field("children", &self.len())
            .finish()
    }
}

/// Disposes the wrapped disposable when dropped.
///
/// ```
/// use std::sync::Arc;
/// use reactive_streams::{Disposable, ScopedDisposable, SimpleDisposable};
///
/// let inner = Arc::new(SimpleDisposable::new());
/// {
///     let _scope = ScopedDisposable::new(inner.clone());
/// }
/// assert!(inner.is_disposed());
/// ```
#[must_use = "the disposable is disposed as soon as the scope is dropped"]
pub struct ScopedDisposable<D: Disposable> {
    inner: D,
}

impl<D: Disposable> ScopedDisposable<D> {
    pub fn new(inner: D) -> Self {
        Self {
            inner,
        }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: Disposable> Disposable for ScopedDisposable<D> {
    fn dispose(&self) {
        self.inner.dispose()
    }

    fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

impl<D: Disposable> Drop for ScopedDisposable<D> {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}
