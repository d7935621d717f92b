//! A thread-safe, push-based stream engine.
//!
//! This crate provides the building blocks for event streams whose executions can be cancelled
//! deterministically, from any thread:
//!
//! - [`Signal`]: a hot, multicast stream. It produces as soon as it is created and delivers each
//!   event synchronously to the observers attached at that moment.
//! - [`Producer`]: a cold blueprint. Every start creates a fresh signal, runs the producer body and
//!   returns a [`Disposable`] for that one execution.
//! - [`Observer`]: the sink receiving [`Event`]s: values, then at most one of `Failed`,
//!   `Completed` or `Interrupted`.
//! - [`Disposable`] and [`CompositeDisposable`]: idempotent cancellation handles. Disposing an
//!   execution interrupts its observer and transitively disposes everything it started.
//!
//! Operators are applied to producers either with [`Producer::lift`], which applies any signal
//! operator to every execution, or with the fast paths [`Producer::map`] and
//! [`Producer::map_error`], which add no per-start signal at all.
//!
//! # Example
//!
//! ```rust
//! use std::convert::Infallible;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use reactive_streams::{Disposable, Producer, Signal};
//!
//! let (signal, input) = Signal::<i32, Infallible>::pipe();
//! let producer = (0..32).fold(Producer::from_signal(signal.clone()), |producer, _| producer.map(|value| value + 1));
//!
//! let received = Arc::new(AtomicI32::new(0));
//! let received_for_observer = received.clone();
//! let disposable = producer.start_with_values(move |value| received_for_observer.store(value, Ordering::SeqCst));
//!
//! input.send_value(1);
//! disposable.dispose();
//!
//! assert_eq!(received.load(Ordering::SeqCst), 33);
//! assert_eq!(signal.observer_count(), 0);
//! ```

pub mod diagnostics;
mod disposable;
mod error;
mod event;
mod observer;
mod producer;
mod signal;


pub use disposable::{ActionDisposable, AnyDisposable, CompositeDisposable, Disposable, ScopedDisposable, SimpleDisposable};
pub use error::WaitError;
pub use event::Event;
pub use observer::Observer;
pub use producer::Producer;
pub use signal::Signal;
