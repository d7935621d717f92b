//! Resource counters.
//!
//! Counters are kept per thread. Signals and composites are created on the thread that calls
//! [`Producer::start`](crate::Producer::start) (or any other constructor), so the difference
//! between two readings taken on the same thread is exact even while other threads, e.g. other
//! tests, are creating streams of their own.

use std::cell::Cell;

thread_local! {
    static SIGNALS_CREATED: Cell<u64> = const { Cell::new(0) };
    static COMPOSITES_CREATED: Cell<u64> = const { Cell::new(0) };
}

/// Total number of signals created on the calling thread.
#[must_use]
pub fn signals_created() -> u64 {
    SIGNALS_CREATED.with(Cell::get)
}

/// Total number of composite disposables created on the calling thread.
#[must_use]
pub fn composites_created() -> u64 {
    COMPOSITES_CREATED.with(Cell::get)
}

pub(crate) fn record_signal_created() {
    SIGNALS_CREATED.with(|count| count.set(count.get() + 1));
}

pub(crate) fn record_composite_created() {
    COMPOSITES_CREATED.with(|count| count.set(count.get() + 1));
}
