//! Conformance tests for the shared core: delivery, suppression, teardown
//! and interrupt signalling through the public handle surface.

mod common;

use common::*;
use proptest::prelude::*;
use rendezvous::{pair, Error, ErrorKind, ErrorValue, Future, Outcome};
use std::sync::{Arc, Mutex};
use std::thread;

fn app_error(context: &str) -> ErrorValue {
    ErrorValue::new(Error::new(ErrorKind::BrokenPromise).with_context(context))
}

#[test]
fn result_then_callback_delivers_value() {
    init_test_logging();
    let (promise, future) = pair();
    let recorder = Recorder::new();

    promise.set_value(7).expect("first value");
    assert!(future.has_result());

    future.set_callback(recorder.callback()).expect("first callback");
    assert_eq!(recorder.single().value(), Some(&7));
}

#[test]
fn callback_then_result_delivers_failure() {
    init_test_logging();
    let (promise, future) = pair::<i32>();
    let recorder = Recorder::new();

    future.set_callback(recorder.callback()).expect("first callback");
    assert!(!future.has_result());

    promise.set_error(app_error("computation failed")).expect("first error");

    let outcome = recorder.single();
    let failure = outcome.failure().expect("failure delivered");
    assert_eq!(failure.to_string(), "BrokenPromise: computation failed");
}

#[test]
fn deactivated_core_holds_fire_until_activated() {
    init_test_logging();
    let (promise, future) = pair();
    let recorder = Recorder::new();

    future.deactivate();
    future.set_callback(recorder.callback()).expect("first callback");
    promise.set_value(3).expect("first value");

    // Armed, but suppressed.
    assert!(future.has_result());
    assert_eq!(recorder.count(), 0);

    future.activate();
    assert_eq!(recorder.single().value(), Some(&3));
}

#[test]
fn dropped_promise_delivers_broken_promise() {
    init_test_logging();
    let (promise, future) = pair::<i32>();
    let recorder = Recorder::new();

    future.set_callback(recorder.callback()).expect("first callback");
    drop(promise);

    let outcome = recorder.single();
    let failure = outcome.failure().expect("broken promise");
    assert_eq!(
        failure.downcast_ref::<Error>().expect("crate error").kind(),
        ErrorKind::BrokenPromise
    );
}

#[test]
fn honored_interrupt_round_trip() {
    init_test_logging();
    let (promise, future) = pair::<i32>();
    let recorder = Recorder::new();
    future.set_callback(recorder.callback()).expect("first callback");

    let interrupts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&interrupts);
    promise.set_interrupt_handler(move |err| {
        sink.lock().expect("sink poisoned").push(err);
    });

    future.raise(app_error("cancel requested"));

    // The handler ran synchronously with the raised error.
    let raised = {
        let interrupts = interrupts.lock().expect("sink poisoned");
        assert_eq!(interrupts.len(), 1);
        interrupts[0].clone()
    };
    assert_eq!(raised.to_string(), "BrokenPromise: cancel requested");

    // The producer honors the request by failing with the same error.
    promise.set_error(raised).expect("first error");
    let outcome = recorder.single();
    assert_eq!(
        outcome.failure().expect("failure delivered").to_string(),
        "BrokenPromise: cancel requested"
    );
}

#[test]
fn interrupt_before_handler_fires_on_registration() {
    init_test_logging();
    let (promise, future) = pair::<i32>();

    future.raise(app_error("early"));

    let recorder = Recorder::new();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    promise.set_interrupt_handler(move |err| {
        *sink.lock().expect("sink poisoned") = Some(err);
    });
    assert!(seen.lock().expect("sink poisoned").is_some());

    future.set_callback(recorder.callback()).expect("first callback");
    promise.set_value(0).expect("first value");
    assert_eq!(recorder.single().value(), Some(&0));
}

#[test]
fn raise_after_result_is_ignored() {
    init_test_logging();
    let (promise, future) = pair();
    promise.set_value(1).expect("first value");

    let handled = Arc::new(Mutex::new(false));
    let sink = Arc::clone(&handled);
    future.raise(app_error("too late"));
    promise.set_interrupt_handler(move |_| {
        *sink.lock().expect("sink poisoned") = true;
    });

    assert!(!*handled.lock().expect("sink poisoned"));
}

#[test]
fn double_set_is_surfaced_on_both_sides() {
    init_test_logging();
    let (promise, future) = pair();
    promise.set_value(1).expect("first value");
    let err = promise.set_value(2).expect_err("second value");
    assert_eq!(err.kind(), ErrorKind::ResultAlreadySet);

    future.set_callback(|_| {}).expect("first callback");
    let err = future.set_callback(|_| {}).expect_err("second callback");
    assert_eq!(err.kind(), ErrorKind::CallbackAlreadySet);
}

#[test]
fn has_result_is_monotone() {
    init_test_logging();
    let (promise, future) = pair();
    let core = future.core();
    assert!(!core.has_result());

    promise.set_value(5).expect("first value");
    assert!(core.has_result());

    future.set_callback(|_| {}).expect("first callback");
    drop(future);
    drop(promise);
    // Still true after delivery and teardown of both handles.
    assert!(core.has_result());
    assert!(core.is_ready());
}

#[test]
fn suppressed_callback_is_dropped_unfired_on_teardown() {
    init_test_logging();
    let (promise, future) = pair::<i32>();
    let core = future.core();
    let recorder = Recorder::new();
    let (sensor, probe) = DropSensor::new();

    let callback = recorder.callback();
    future
        .set_callback(move |outcome| {
            let _held = sensor;
            callback(outcome);
        })
        .expect("first callback");

    // Dropping the consumer handle re-activates, so the suppression has to
    // come from an any-thread core reference afterwards.
    drop(future);
    core.deactivate();

    promise.set_value(3).expect("first value");
    assert_eq!(recorder.count(), 0);
    assert_eq!(probe.drops(), 0);

    drop(promise);
    // Armed, inactive, and now the last share goes away: the callback is
    // destroyed without ever firing.
    drop(core);
    assert_eq!(recorder.count(), 0);
    assert_eq!(probe.drops(), 1);
}

#[test]
fn racing_producer_and_consumer_deliver_exactly_once() {
    init_test_logging();
    for round in 0..200 {
        let (promise, future) = pair();
        let recorder = Recorder::new();
        let callback = recorder.callback();

        let producer = thread::spawn(move || {
            promise.set_value(round).expect("first value");
        });
        let consumer = thread::spawn(move || {
            future.set_callback(callback).expect("first callback");
        });
        producer.join().expect("producer thread");
        consumer.join().expect("consumer thread");

        assert_eq!(recorder.single().value(), Some(&round));
    }
}

#[test]
fn ready_future_needs_no_producer() {
    init_test_logging();
    let future = Future::ready(Outcome::Value(99));
    let recorder = Recorder::new();
    future.set_callback(recorder.callback()).expect("first callback");
    assert_eq!(recorder.single().value(), Some(&99));
}

proptest! {
    /// For any interleaving of result delivery, callback registration and
    /// suppression, the callback fires exactly once with the stored value.
    #[test]
    fn callback_fires_exactly_once(
        value in any::<i32>(),
        result_first in any::<bool>(),
        suppress in any::<bool>(),
        toggle_noise in any::<bool>(),
    ) {
        let (promise, future) = pair();
        let recorder = Recorder::new();

        if suppress {
            future.deactivate();
            if toggle_noise {
                // Idempotence: repeated deactivation changes nothing.
                future.deactivate();
            }
        }

        if result_first {
            promise.set_value(value).expect("first value");
            future.set_callback(recorder.callback()).expect("first callback");
        } else {
            future.set_callback(recorder.callback()).expect("first callback");
            promise.set_value(value).expect("first value");
        }

        if suppress {
            prop_assert_eq!(recorder.count(), 0);
            future.activate();
            if toggle_noise {
                future.activate();
            }
        }

        prop_assert_eq!(recorder.count(), 1);
        let outcome = recorder.single();
        prop_assert_eq!(outcome.value(), Some(&value));
    }
}
