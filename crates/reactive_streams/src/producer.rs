//! Cold, restartable streams.
//!
//! A [`Producer`] is a blueprint. Nothing happens until it is started, and every start is an
//! independent execution with its own [`Signal`], its own [`CompositeDisposable`] lifetime and
//! its own run of the producer body.
//!
//! # Composition
//!
//! There are two ways to derive a producer from another one:
//!
//! - [`Producer::lift`] applies an arbitrary `Signal -> Signal` operator to every execution. Each
//!   lifted stage starts its source, so a chain of `N` lifted operators creates `O(N)` signals
//!   and composites per start.
//! - [`Producer::map`] and [`Producer::map_error`] rewrite the observer instead. The source's
//!   body feeds a wrapped observer directly, so a chain of `N` maps still creates a single
//!   signal and a single composite per start; only the per-event call chain grows with `N`.

use std::convert::Infallible;
use std::fmt::{Debug, Formatter};
use std::mem;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::{Level, trace};

use crate::disposable::{AnyDisposable, CompositeDisposable, Disposable};
use crate::error::WaitError;
use crate::event::Event;
use crate::observer::Observer;
use crate::signal::Signal;

/// The body of a producer, run once per execution.
trait ProducerCore<V, E>: Send + Sync {
    /// Feeds `observer` for one execution, registering any resources it opens with `lifetime`.
    fn run(&self, observer: Observer<V, E>, lifetime: &CompositeDisposable);
}

/// A user supplied body.
struct GeneratorCore<F> {
    setup: F,
}

impl<V, E, F> ProducerCore<V, E> for GeneratorCore<F>
where
    F: Fn(Observer<V, E>, &CompositeDisposable) + Send + Sync,
{
    fn run(&self, observer: Observer<V, E>, lifetime: &CompositeDisposable) {
        (self.setup)(observer, lifetime)
    }
}

/// Every execution observes the same hot signal.
struct HotSignalCore<V, E> {
    signal: Signal<V, E>,
}

impl<V, E> ProducerCore<V, E> for HotSignalCore<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn run(&self, observer: Observer<V, E>, lifetime: &CompositeDisposable) {
        if let Some(observation) = self.signal.observe(observer) {
            lifetime.add(observation);
        }
    }
}

/// Runs the source body with an observer rewritten by `transform`, without a signal of its own.
struct TransformerCore<S, SE, F> {
    source: Arc<dyn ProducerCore<S, SE>>,
    transform: F,
}

impl<V, E, S, SE, F> ProducerCore<V, E> for TransformerCore<S, SE, F>
where
    F: Fn(Observer<V, E>) -> Observer<S, SE> + Send + Sync,
{
    fn run(&self, observer: Observer<V, E>, lifetime: &CompositeDisposable) {
        self.source
            .run((self.transform)(observer), lifetime)
    }
}

/// A cold stream of events that can be started any number of times.
///
/// ```
/// use std::convert::Infallible;
/// use reactive_streams::{Disposable, Producer};
///
/// let numbers = Producer::<i32, Infallible>::values([1, 2, 3]).map(|value| value * 2);
///
/// assert_eq!(numbers.last(), Ok(6));
/// let disposable = numbers.start_with_values(|value| println!("{}", value));
/// assert!(disposable.is_disposed());
/// ```
pub struct Producer<V, E = Infallible> {
    core: Arc<dyn ProducerCore<V, E>>,
}

impl<V, E> Producer<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a producer from a body.
    ///
    /// The body runs once per start. It receives the observer that feeds the execution and the
    /// execution's lifetime, to which it should add every resource it opens, including the
    /// disposables of nested starts.
    pub fn new(setup: impl Fn(Observer<V, E>, &CompositeDisposable) + Send + Sync + 'static) -> Self {
        Self::from_core(GeneratorCore {
            setup,
        })
    }

    /// Wraps a hot signal.
    ///
    /// Every start attaches a new observer to the same `signal`; disposing the execution detaches
    /// it again.
    pub fn from_signal(signal: Signal<V, E>) -> Self {
        Self::from_core(HotSignalCore {
            signal,
        })
    }

    /// Sends `value`, then completes.
    pub fn value(value: V) -> Self
    where
        V: Sync,
    {
        Self::new(move |observer, _| {
            observer.send_value(value.clone());
            observer.send_completed();
        })
    }

    /// Sends each of `values`, then completes.
    pub fn values(values: impl IntoIterator<Item = V>) -> Self
    where
        V: Sync,
    {
        let values: Vec<V> = values.into_iter().collect();
        Self::new(move |observer, lifetime| {
            for value in &values {
                if lifetime.is_disposed() {
                    return;
                }
                observer.send_value(value.clone());
            }
            observer.send_completed();
        })
    }

    /// Fails immediately with `error`.
    pub fn failed(error: E) -> Self
    where
        E: Sync,
    {
        Self::new(move |observer, _| observer.send_failed(error.clone()))
    }

    /// Completes immediately.
    pub fn empty() -> Self {
        Self::new(|observer, _| observer.send_completed())
    }

    /// Never sends anything; executions only end when disposed.
    pub fn never() -> Self {
        Self::new(|_, _| {})
    }

    fn from_core(core: impl ProducerCore<V, E> + 'static) -> Self {
        Self {
            core: Arc::new(core),
        }
    }

    /// Creates one execution and hands its signal to `setup` before the body runs.
    ///
    /// The order is fixed:
    /// 1. a fresh lifetime and signal are created, and disposing the lifetime interrupts the signal,
    /// 2. `setup` receives the signal and the lifetime, so observers and disposal links are in
    ///    place before any event can be produced,
    /// 3. the producer body runs, unless `setup` already disposed the execution.
    pub fn start_with_signal<R>(&self, setup: impl FnOnce(Signal<V, E>, AnyDisposable) -> R) -> R {
        let lifetime = Arc::new(CompositeDisposable::new());
        let disposable: AnyDisposable = lifetime.clone();
        let (signal, observer) = Signal::pipe_with_disposable(disposable.clone());

        let interrupter = observer.clone();
        lifetime.add_action(move || interrupter.send_interrupted());

        trace!("Starting execution.");
        let result = setup(signal, disposable);

        if !lifetime.is_disposed() {
            self.core.run(observer, &lifetime);
        }

        result
    }

    /// Starts an execution delivering to `observer`.
    ///
    /// Disposing the returned disposable interrupts the execution: `observer` receives
    /// [`Event::Interrupted`] (unless a terminal event was already delivered) and nothing after
    /// it, and every resource the body registered is released.
    ///
    /// # Lifetime
    ///
    /// Dropping the returned disposable without disposing it leaves the execution running until
    /// it terminates on its own.
    pub fn start_with_observer(&self, observer: Observer<V, E>) -> AnyDisposable {
        self.start_with_signal(|signal, disposable| {
            signal.observe(observer);
            disposable
        })
    }

    /// Starts an execution, ignoring its events.
    ///
    /// # Lifetime
    ///
    /// A dropped, undisposed execution keeps running until it terminates on its own.
    pub fn start(&self) -> AnyDisposable {
        self.start_with_observer(Observer::noop())
    }

    pub fn start_with_values(&self, action: impl Fn(V) + Send + Sync + 'static) -> AnyDisposable {
        self.start_with_observer(Observer::on_value(action))
    }

    /// Applies a signal operator to every execution.
    ///
    /// ```
    /// use std::convert::Infallible;
    /// use reactive_streams::Producer;
    ///
    /// let producer = Producer::<i32, Infallible>::values([1, 2]).lift(|signal| signal.map(|value| value + 1));
    /// assert_eq!(producer.last(), Ok(3));
    /// ```
    pub fn lift<U, F>(&self, transform: impl Fn(Signal<V, E>) -> Signal<U, F> + Send + Sync + 'static) -> Producer<U, F>
    where
        U: Clone + Send + 'static,
        F: Clone + Send + 'static,
    {
        let source = self.clone();
        Producer::<U, F>::new(move |observer, lifetime| {
            source.start_with_signal(|signal, inner| {
                // linked before the operator runs, so a synchronous source cannot outrun disposal
                lifetime.add(inner);
                transform(signal).observe(observer);
            })
        })
    }

    /// Maps each value, without a signal per stage.
    pub fn map<U>(&self, transform: impl Fn(V) -> U + Send + Sync + 'static) -> Producer<U, E>
    where
        U: Clone + Send + 'static,
    {
        let transform = Arc::new(transform);
        self.transform_observer(move |observer: Observer<U, E>| {
            let transform = transform.clone();
            Observer::new(move |event: Event<V, E>| observer.send(event.map(&*transform)))
        })
    }

    /// Maps the error of a failed event, without a signal per stage.
    pub fn map_error<F>(&self, transform: impl Fn(E) -> F + Send + Sync + 'static) -> Producer<V, F>
    where
        F: Clone + Send + 'static,
    {
        let transform = Arc::new(transform);
        self.transform_observer(move |observer: Observer<V, F>| {
            let transform = transform.clone();
            Observer::new(move |event: Event<V, E>| observer.send(event.map_error(&*transform)))
        })
    }

    fn transform_observer<U, F>(
        &self,
        transform: impl Fn(Observer<U, F>) -> Observer<V, E> + Send + Sync + 'static,
    ) -> Producer<U, F>
    where
        U: Clone + Send + 'static,
        F: Clone + Send + 'static,
    {
        Producer::<U, F>::from_core(TransformerCore {
            source: self.core.clone(),
            transform,
        })
    }

    /// Starts an execution and blocks until it sends its first value.
    #[tracing::instrument(level = Level::DEBUG, skip_all)]
    pub fn first(&self) -> Result<V, WaitError<E>> {
        let mut outcome = self.block_until(|outcome| !outcome.values.is_empty());
        if !outcome.values.is_empty() {
            return Ok(outcome.values.swap_remove(0));
        }
        Err(outcome.failure().unwrap_or(WaitError::Empty))
    }

    /// Starts an execution, blocks until it terminates and returns the last value.
    #[tracing::instrument(level = Level::DEBUG, skip_all)]
    pub fn last(&self) -> Result<V, WaitError<E>> {
        let mut outcome = self.block_until(|_| false);
        if let Some(error) = outcome.failure() {
            return Err(error);
        }
        outcome.values.pop().ok_or(WaitError::Empty)
    }

    /// Starts an execution, blocks until it terminates and returns its only value.
    #[tracing::instrument(level = Level::DEBUG, skip_all)]
    pub fn single(&self) -> Result<V, WaitError<E>> {
        let mut outcome = self.block_until(|outcome| outcome.values.len() > 1);
        if outcome.values.len() > 1 {
            return Err(WaitError::MultipleValues);
        }
        if let Some(error) = outcome.failure() {
            return Err(error);
        }
        outcome.values.pop().ok_or(WaitError::Empty)
    }

    /// Starts an execution and blocks until it terminates, discarding values.
    #[tracing::instrument(level = Level::DEBUG, skip_all)]
    pub fn wait(&self) -> Result<(), WaitError<E>> {
        let mut outcome = self.block_until(|_| false);
        match outcome.failure() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Blocks the calling thread until the execution terminates or `done` holds, then disposes it.
    fn block_until(&self, done: impl Fn(&Outcome<V, E>) -> bool) -> Outcome<V, E> {
        let shared = Arc::new(SharedOutcome {
            outcome: Mutex::new(Outcome::new()),
            changed: Condvar::new(),
        });

        let shared_for_observer = shared.clone();
        let disposable = self.start_with_observer(Observer::new(move |event| {
            let mut outcome = shared_for_observer.outcome.lock();
            match event {
                Event::Value(value) => outcome.values.push(value),
                terminal => outcome.terminal = Some(terminal),
            }
            shared_for_observer
                .changed
                .notify_all();
        }));

        let outcome = {
            let mut outcome = shared.outcome.lock();
            while outcome.terminal.is_none() && !done(&*outcome) {
                shared.changed.wait(&mut outcome);
            }
            mem::replace(&mut *outcome, Outcome::new())
        };

        disposable.dispose();
        outcome
    }
}

struct SharedOutcome<V, E> {
    outcome: Mutex<Outcome<V, E>>,
    changed: Condvar,
}

/// What a blocked caller has seen of an execution so far.
struct Outcome<V, E> {
    values: Vec<V>,
    terminal: Option<Event<V, E>>,
}

impl<V, E> Outcome<V, E> {
    fn new() -> Self {
        Self {
            values: Vec::new(),
            terminal: None,
        }
    }

    /// The error for a failed or interrupted execution, `None` if it completed (or is still running).
    fn failure(&mut self) -> Option<WaitError<E>> {
        match self.terminal.take() {
            Some(Event::Failed(error)) => Some(WaitError::Failed(error)),
            Some(Event::Interrupted) => Some(WaitError::Interrupted),
            _ => None,
        }
    }
}

impl<V, E> Clone for Producer<V, E> {
    fn clone(&self) -> Self {
        Self {
            core: self.core.clone(),
        }
    }
}

impl<V, E> Debug for Producer<V, E> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Producer")
            .finish_non_exhaustive()
    }
}
