//! Hot, multicast event sources.
//!
//! # Invariants
//!
//! 1. Events reach every observer in the order they were sent. Sends on one signal are
//!    serialised. A callback may send into the same signal on its own thread; that event is
//!    queued and broadcast once the event in flight has reached every observer.
//! 2. A value is broadcast to the observers attached when its broadcast starts. Observers
//!    attached during the broadcast do not receive it, and nothing is buffered for later
//!    observers.
//! 3. The terminal transition happens at most once. It broadcasts the terminal event, clears the
//!    observer set and then disposes the disposable the signal retained from its generator.
//! 4. An `observe` racing with termination either registers before the observer set is taken
//!    (and receives the broadcast) or sees the stored terminal event and receives it
//!    synchronously. It is never left without a terminal event.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::fmt::{Debug, Formatter};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex};
use slotmap::{SlotMap, new_key_type};
use tracing::trace;

use crate::diagnostics;
use crate::disposable::{AnyDisposable, Disposable};
use crate::event::Event;
use crate::observer::Observer;

new_key_type! {
    struct ObserverKey;
}

enum State<V, E> {
    Alive(SlotMap<ObserverKey, Observer<V, E>>),
    /// Holds the terminal event for observers that arrive late.
    Terminated(Event<V, E>),
}

/// Events sent while a broadcast is in flight on the sending thread.
struct Delivery<V, E> {
    draining: bool,
    pending: VecDeque<Event<V, E>>,
}

struct Core<V, E> {
    send_lock: ReentrantMutex<RefCell<Delivery<V, E>>>,
    terminated: AtomicBool,
    state: Mutex<State<V, E>>,
    /// The generator's disposable, disposed on termination.
    disposable: Mutex<Option<AnyDisposable>>,
}

impl<V, E> Core<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn new() -> Self {
        diagnostics::record_signal_created();
        Self {
            send_lock: ReentrantMutex::new(RefCell::new(Delivery {
                draining: false,
                pending: VecDeque::new(),
            })),
            terminated: AtomicBool::new(false),
            state: Mutex::new(State::Alive(SlotMap::with_key())),
            disposable: Mutex::new(None),
        }
    }

    /// The observer that feeds events into this signal.
    fn input(core: &Arc<Self>) -> Observer<V, E> {
        let core = core.clone();
        Observer::new(move |event| core.send(event))
    }

    fn send(&self, event: Event<V, E>) {
        let delivery = self.send_lock.lock();

        {
            let mut delivery = delivery.borrow_mut();
            delivery.pending.push_back(event);
            // re-entrant send from a callback, the outermost send delivers it
            if delivery.draining {
                return;
            }
            delivery.draining = true;
        }

        let _draining = Draining(&*delivery);
        loop {
            // the borrow ends before any callback runs
            let next = delivery.borrow_mut().pending.pop_front();
            let Some(event) = next else {
                break;
            };

            if event.is_terminating() {
                self.terminate(event);
            } else {
                self.broadcast(event);
            }
        }
    }

    fn broadcast(&self, event: Event<V, E>) {
        let observers: Vec<Observer<V, E>> = match &*self.state.lock() {
            State::Alive(observers) => observers.values().cloned().collect(),
            State::Terminated(_) => return,
        };

        for observer in observers {
            observer.send(event.clone());
        }
    }

    fn terminate(&self, event: Event<V, E>) {
        if self.terminated.swap(true, Ordering::AcqRel) {
            return;
        }

        let previous = mem::replace(&mut *self.state.lock(), State::Terminated(event.clone()));
        let State::Alive(observers) = previous else {
            return;
        };

        trace!(
            "Signal terminated. event: {}, observers: {}",
            event.as_label(),
            observers.len()
        );

        for (_, observer) in observers {
            observer.send(event.clone());
        }

        let disposable = self.disposable.lock().take();
        if let Some(disposable) = disposable {
            disposable.dispose();
        }
    }

    fn retain(&self, disposable: AnyDisposable) {
        let rejected = {
            let mut slot = self.disposable.lock();
            if self.terminated.load(Ordering::Acquire) {
                Some(disposable)
            } else {
                *slot = Some(disposable);
                None
            }
        };

        if let Some(disposable) = rejected {
            disposable.dispose();
        }
    }

    fn observe(core: &Arc<Self>, observer: Observer<V, E>) -> Option<AnyDisposable> {
        let terminal = {
            let mut state = core.state.lock();
            match &mut *state {
                State::Alive(observers) => {
                    let key = observers.insert(observer);
                    return Some(Arc::new(Observation {
                        core: Arc::downgrade(core),
                        key,
                        disposed: AtomicBool::new(false),
                    }));
                }
                State::Terminated(event) => event.clone(),
            }
        };

        observer.send(terminal);
        None
    }

    fn remove(&self, key: ObserverKey) {
        let removed = match &mut *self.state.lock() {
            State::Alive(observers) => observers.remove(key),
            State::Terminated(_) => None,
        };
        // dropped outside the lock, the callback may own resources with their own teardown
        drop(removed);
    }

    fn observer_count(&self) -> usize {
        match &*self.state.lock() {
            State::Alive(observers) => observers.len(),
            State::Terminated(_) => 0,
        }
    }
}

/// Ends a drain, also when a callback panics, so the signal keeps accepting sends.
struct Draining<'a, V, E>(&'a RefCell<Delivery<V, E>>);

impl<V, E> Drop for Draining<'_, V, E> {
    fn drop(&mut self) {
        let mut delivery = self.0.borrow_mut();
        delivery.draining = false;
        delivery.pending.clear();
    }
}

/// Detaches one observer from a signal.
struct Observation<V, E> {
    core: Weak<Core<V, E>>,
    key: ObserverKey,
    disposed: AtomicBool,
}

impl<V, E> Disposable for Observation<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(core) = self.core.upgrade() {
            core.remove(self.key);
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// A hot, multicast stream of events.
///
/// A signal starts producing as soon as it is created and delivers events synchronously on
/// whichever thread sends them. Cloning a `Signal` yields another handle to the same stream.
pub struct Signal<V, E = Infallible> {
    core: Arc<Core<V, E>>,
}

impl<V, E> Signal<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a signal and runs `generator` synchronously with the observer that feeds it.
    ///
    /// The disposable returned by `generator` is retained and disposed when the signal
    /// terminates (immediately, if the generator already terminated it).
    pub fn create(generator: impl FnOnce(Observer<V, E>) -> Option<AnyDisposable>) -> Self {
        let (signal, observer) = Self::pipe();
        if let Some(disposable) = generator(observer) {
            signal.core.retain(disposable);
        }
        signal
    }

    /// A manually fed signal and the observer that feeds it.
    ///
    /// ```
    /// use std::convert::Infallible;
    /// use reactive_streams::Signal;
    ///
    /// let (signal, input) = Signal::<i32, Infallible>::pipe();
    /// signal.observe_values(|value| println!("got {}", value));
    /// input.send_value(1);
    /// input.send_completed();
    /// assert!(signal.is_terminated());
    /// ```
    pub fn pipe() -> (Self, Observer<V, E>) {
        let core = Arc::new(Core::new());
        let observer = Core::input(&core);
        (Self {
            core,
        }, observer)
    }

    /// Like [`pipe`](Self::pipe), retaining `disposable` until the signal terminates.
    pub fn pipe_with_disposable(disposable: AnyDisposable) -> (Self, Observer<V, E>) {
        let (signal, observer) = Self::pipe();
        signal.core.retain(disposable);
        (signal, observer)
    }

    /// A signal that never sends anything.
    pub fn never() -> Self {
        let (signal, _) = Self::pipe();
        signal
    }

    /// A signal that has already completed.
    pub fn empty() -> Self {
        Self::create(|observer| {
            observer.send_completed();
            None
        })
    }

    /// Attaches `observer`.
    ///
    /// Returns a disposable that detaches it again. If the signal has already terminated, the
    /// stored terminal event is delivered synchronously and `None` is returned.
    pub fn observe(&self, observer: Observer<V, E>) -> Option<AnyDisposable> {
        Core::observe(&self.core, observer)
    }

    pub fn observe_values(&self, action: impl Fn(V) + Send + Sync + 'static) -> Option<AnyDisposable> {
        self.observe(Observer::on_value(action))
    }

    /// Maps each value.
    pub fn map<U>(&self, transform: impl Fn(V) -> U + Send + Sync + 'static) -> Signal<U, E>
    where
        U: Clone + Send + 'static,
    {
        Signal::create(|observer| {
            self.observe(Observer::new(move |event: Event<V, E>| {
                observer.send(event.map(&transform))
            }))
        })
    }

    /// Maps the error of a failed event.
    pub fn map_error<F>(&self, transform: impl Fn(E) -> F + Send + Sync + 'static) -> Signal<V, F>
    where
        F: Clone + Send + 'static,
    {
        Signal::create(|observer| {
            self.observe(Observer::new(move |event: Event<V, E>| {
                observer.send(event.map_error(&transform))
            }))
        })
    }

    pub fn is_terminated(&self) -> bool {
        self.core
            .terminated
            .load(Ordering::Acquire)
    }

    /// The number of observers currently attached.
    pub fn observer_count(&self) -> usize {
        self.core.observer_count()
    }
}

impl<V, E> Clone for Signal<V, E> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<V, E> Debug for Signal<V, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("terminated", &self.core.terminated.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}
