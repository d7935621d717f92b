//! End-to-end behaviour of producer executions: chained operators, disposal and cross-thread races.

pub mod common;

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use reactive_streams::test::EventRecorder;
use reactive_streams::{Disposable, Event, Observer, Producer, Signal};
use rstest::rstest;

use crate::common::init_logging;

const CHAIN_DEPTH: usize = 32;
const STARTS: usize = 1000;

/// Map, expressed through the generic lifting path.
trait LiftedMap<V> {
    fn lifted_map<U>(&self, transform: impl Fn(V) -> U + Send + Sync + 'static) -> Producer<U, Infallible>
    where
        U: Clone + Send + 'static;
}

impl<V: Clone + Send + 'static> LiftedMap<V> for Producer<V, Infallible> {
    fn lifted_map<U>(&self, transform: impl Fn(V) -> U + Send + Sync + 'static) -> Producer<U, Infallible>
    where
        U: Clone + Send + 'static,
    {
        let transform = Arc::new(transform);
        self.lift(move |signal| {
            let transform = transform.clone();
            signal.map(move |value| transform(value))
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Chain {
    Map,
    Lifted,
}

fn build_chain(chain: Chain, source: Producer<i32, Infallible>) -> Producer<i32, Infallible> {
    (0..CHAIN_DEPTH).fold(source, |producer, _| match chain {
        Chain::Map => producer.map(|value| value + 1),
        Chain::Lifted => producer.lifted_map(|value| value + 1),
    })
}

#[rstest]
#[case(Chain::Map)]
#[case(Chain::Lifted)]
fn chained_stages_started_repeatedly(#[case] chain: Chain) {
    init_logging();

    // given
    let (signal, input) = Signal::<i32, Infallible>::pipe();
    let producer = build_chain(chain, Producer::from_signal(signal.clone()));

    for _ in 0..STARTS {
        // when
        let recorder = EventRecorder::new();
        let disposable = producer.start_with_observer(recorder.observer());
        input.send_value(1);
        disposable.dispose();

        // then
        assert_eq!(recorder.events(), vec![Event::Value(33), Event::Interrupted]);
        assert_eq!(signal.observer_count(), 0);
    }
}

#[test]
fn pipe_does_not_buffer_for_late_observers() {
    init_logging();

    // given
    let (signal, input) = Signal::<i32, Infallible>::pipe();
    input.send_value(1);

    // when
    let recorder = EventRecorder::new();
    signal.observe(recorder.observer());

    // then
    assert!(recorder.is_empty());
}

#[test]
fn sequential_executions_do_not_see_each_other() {
    init_logging();

    // given
    let sources: Arc<parking_lot::Mutex<Vec<Observer<usize, Infallible>>>> = Arc::default();
    let sources_for_body = sources.clone();
    let producer = Producer::<usize, Infallible>::new(move |observer, _| sources_for_body.lock().push(observer));

    let recorders: Vec<EventRecorder<usize, Infallible>> = (0..3)
        .map(|_| {
            let recorder = EventRecorder::new();
            producer.start_with_observer(recorder.observer());
            recorder
        })
        .collect();

    // when
    for (index, source) in sources.lock().iter().enumerate() {
        source.send_value(index);
        source.send_completed();
    }

    // then
    for (index, recorder) in recorders.iter().enumerate() {
        assert_eq!(recorder.events(), vec![Event::Value(index), Event::Completed]);
    }
}

#[rstest]
#[case(Chain::Map)]
#[case(Chain::Lifted)]
fn dispose_racing_with_send_never_delivers_after_interruption(#[case] chain: Chain) {
    init_logging();

    // given
    let (signal, input) = Signal::<i32, Infallible>::pipe();
    let producer = build_chain(chain, Producer::from_signal(signal.clone()));
    let running = Arc::new(AtomicBool::new(true));

    let sender = {
        let running = running.clone();
        thread::spawn(move || {
            while running.load(Ordering::SeqCst) {
                input.send_value(1);
            }
        })
    };

    // when
    let recorders: Vec<EventRecorder<i32, Infallible>> = (0..200)
        .map(|_| {
            let recorder = EventRecorder::new();
            let disposable = producer.start_with_observer(recorder.observer());
            thread::yield_now();
            disposable.dispose();
            recorder
        })
        .collect();

    running.store(false, Ordering::SeqCst);
    sender
        .join()
        .expect("sender panicked");

    // then
    for recorder in recorders {
        let events = recorder.events();
        assert_eq!(events.last(), Some(&Event::Interrupted));
        assert!(
            events[..events.len() - 1]
                .iter()
                .all(|event| *event == Event::Value(33))
        );
    }
    assert_eq!(signal.observer_count(), 0);
}

#[test]
fn concurrent_starts_are_independent() {
    const THREADS: usize = 4;

    init_logging();

    // given
    let executions = Arc::new(AtomicUsize::new(0));
    let executions_for_body = executions.clone();
    let producer = Producer::<usize, Infallible>::new(move |observer, _| {
        let execution = executions_for_body.fetch_add(1, Ordering::SeqCst);
        observer.send_value(execution);
        observer.send_completed();
    })
    .map(|execution| execution * 10);
    let barrier = Arc::new(Barrier::new(THREADS));

    // when
    let workers: Vec<_> = (0..THREADS)
        .map(|_| {
            let producer = producer.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..100)
                    .map(|_| producer.single())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut results: Vec<usize> = workers
        .into_iter()
        .flat_map(|worker| {
            worker
                .join()
                .expect("worker panicked")
        })
        .map(|result| result.expect("single value"))
        .collect();

    // then
    results.sort_unstable();
    let expected: Vec<usize> = (0..THREADS * 100)
        .map(|execution| execution * 10)
        .collect();
    assert_eq!(results, expected);
    assert_eq!(executions.load(Ordering::SeqCst), THREADS * 100);
}

#[test]
fn disposing_before_first_event_blocks_late_source() {
    init_logging();

    // given
    let (start_source, start_input) = Signal::<(), Infallible>::pipe();
    let producer = Producer::<i32, Infallible>::new(move |observer, lifetime| {
        // the source only emits once told to, long after the caller disposed
        if let Some(observation) = start_source.observe_values(move |_| observer.send_value(1)) {
            lifetime.add(observation);
        }
    })
    .lifted_map(|value| value + 1);
    let recorder = EventRecorder::new();

    // when
    producer
        .start_with_observer(recorder.observer())
        .dispose();
    start_input.send_value(());

    // then
    assert_eq!(recorder.events(), vec![Event::Interrupted]);
}
