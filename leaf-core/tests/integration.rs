//! Integration Tests for Signal Dispatch
//!
//! These tests drive leaves through a `ManualScheduler` so that every
//! dispatch step, and therefore every ordering, is deterministic.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;

use leaf_core::{
    Callback, Done, Handler, Leaf, LeafError, ManualScheduler, Signal, UnhandledPolicy, CONNECT,
    WILDCARD,
};

type Log = Arc<Mutex<Vec<String>>>;

fn leaf_on(scheduler: &Arc<ManualScheduler>) -> Leaf {
    Leaf::builder().scheduler(scheduler.clone()).build()
}

/// Handler that records every signal name it sees and completes at once.
fn record_into(log: &Log) -> impl Handler {
    let log = log.clone();
    move |_: &Leaf, signal: Signal, done: Done| {
        log.lock().push(signal.name().unwrap_or_default().to_string());
        done.ok();
    }
}

/// Signals queued on an idle leaf are dispatched newest first.
#[test]
fn dispatch_order_is_lifo() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let log = Log::default();
    leaf.add_handler(WILDCARD, record_into(&log)).unwrap();

    leaf.signal(Signal::new("s1"), Callback::Ignore);
    leaf.signal(Signal::new("s2"), Callback::Ignore);
    leaf.signal(Signal::new("s3"), Callback::Ignore);
    scheduler.run_until_idle();

    assert_eq!(*log.lock(), vec!["s3", "s2", "s1"]);
}

/// A signal raised while another is in flight overtakes the older backlog,
/// and nothing runs until the in-flight handler completes.
#[test]
fn newest_signal_overtakes_backlog() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let log = Log::default();
    let parked: Arc<Mutex<Vec<Done>>> = Arc::default();

    let handler_log = log.clone();
    let handler_parked = parked.clone();
    leaf.add_handler(WILDCARD, move |_: &Leaf, signal: Signal, done: Done| {
        handler_log
            .lock()
            .push(signal.name().unwrap_or_default().to_string());
        handler_parked.lock().push(done);
    })
    .unwrap();

    leaf.signal(Signal::new("first"), Callback::Ignore);
    scheduler.run_until_idle();
    assert!(leaf.is_busy());

    leaf.signal(Signal::new("older"), Callback::Ignore);
    leaf.signal(Signal::new("newer"), Callback::Ignore);
    scheduler.run_until_idle();
    assert_eq!(*log.lock(), vec!["first"]);
    assert_eq!(leaf.pending(), 2);

    // Completing does not dispatch inline; the next entry waits for a tick.
    let done = parked.lock().pop().unwrap();
    done.ok();
    assert_eq!(*log.lock(), vec!["first"]);
    assert!(!leaf.is_busy());

    scheduler.run_until_idle();
    assert_eq!(*log.lock(), vec!["first", "newer"]);

    let done = parked.lock().pop().unwrap();
    done.ok();
    scheduler.run_until_idle();
    let done = parked.lock().pop().unwrap();
    done.ok();
    scheduler.run_until_idle();

    assert_eq!(*log.lock(), vec!["first", "newer", "older"]);
    assert!(!leaf.is_busy());
}

/// A leaf that keeps signalling itself still lets other leaves run between
/// its signals.
#[test]
fn busy_leaf_does_not_starve_others() {
    let scheduler = Arc::new(ManualScheduler::new());
    let spinner = leaf_on(&scheduler);
    let other = leaf_on(&scheduler);
    let log = Log::default();

    let spin_log = log.clone();
    spinner
        .add_handler("spin", move |leaf: &Leaf, _: Signal, done: Done| {
            let mut log = spin_log.lock();
            log.push("spin".to_string());
            if log.iter().filter(|name| *name == "spin").count() < 5 {
                leaf.signal(Signal::new("spin"), Callback::Ignore);
            }
            drop(log);
            done.ok();
        })
        .unwrap();
    other.add_handler("work", record_into(&log)).unwrap();

    spinner.signal(Signal::new("spin"), Callback::Ignore);
    other.signal(Signal::new("work"), Callback::Ignore);
    scheduler.run_until_idle();

    let log = log.lock();
    assert_eq!(log.len(), 6);
    assert_eq!(log.iter().position(|name| name == "work"), Some(1));
}

/// Each scheduler step dispatches at most one entry.
#[test]
fn one_entry_per_step() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let log = Log::default();
    leaf.add_handler(WILDCARD, record_into(&log)).unwrap();

    for name in ["a", "b", "c"] {
        leaf.signal(Signal::new(name), Callback::Ignore);
    }

    assert!(scheduler.run_once());
    assert_eq!(log.lock().len(), 1);
    assert_eq!(leaf.pending(), 2);
}

/// A nameless signal fails and never reaches a handler, not even `*`.
#[test]
fn missing_name_is_reported_to_the_sender() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let log = Log::default();
    leaf.add_handler(WILDCARD, record_into(&log)).unwrap();

    let mut unnamed = leaf.send(Signal::unnamed());
    let mut empty = leaf.send(Signal::new(""));
    let mut named = leaf.send(Signal::new("after"));
    scheduler.run_until_idle();

    assert!(matches!(unnamed.try_result(), Some(Err(LeafError::MissingSignalName))));
    assert!(matches!(empty.try_result(), Some(Err(LeafError::MissingSignalName))));
    assert!(matches!(named.try_result(), Some(Ok(()))));
    assert_eq!(*log.lock(), vec!["after"]);
}

/// An unknown name with no wildcard handler completes successfully.
#[test]
fn unknown_signal_is_a_no_op() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let peer = leaf_on(&scheduler);

    let mut delivery = leaf.send(Signal::new("mystery").with_target(peer.clone()));
    scheduler.run_until_idle();

    assert!(matches!(delivery.try_result(), Some(Ok(()))));
    assert!(leaf.outputs().is_empty());
    assert!(peer.inputs().is_empty());
    assert!(!leaf.is_busy());
}

/// The wildcard handler catches unknown names; named handlers win.
#[test]
fn wildcard_is_the_fallback() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let named = Log::default();
    let wildcard = Log::default();
    leaf.add_handler("ping", record_into(&named)).unwrap();
    leaf.add_handler(WILDCARD, record_into(&wildcard)).unwrap();

    leaf.signal(Signal::new("ping"), Callback::Ignore);
    leaf.signal(Signal::new("pong"), Callback::Ignore);
    scheduler.run_until_idle();

    assert_eq!(*named.lock(), vec!["ping"]);
    assert_eq!(*wildcard.lock(), vec!["pong"]);
}

/// Handler errors reach the sender verbatim and the queue keeps going.
#[test]
fn failing_handler_does_not_stall_the_queue() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    leaf.add_handler("boom", |_: &Leaf, _: Signal, done: Done| {
        done.fail(LeafError::handler("kaput"))
    })
    .unwrap();
    let log = Log::default();
    leaf.add_handler("fine", record_into(&log)).unwrap();

    let mut fine = leaf.send(Signal::new("fine"));
    let mut boom = leaf.send(Signal::new("boom"));
    scheduler.run_until_idle();

    let err = boom.try_result().unwrap().unwrap_err();
    assert_eq!(err.to_string(), "kaput");
    assert!(matches!(fine.try_result(), Some(Ok(()))));
    assert_eq!(*log.lock(), vec!["fine"]);
}

/// Dropping the continuation reports `Abandoned` and frees the leaf.
#[test]
fn dropped_continuation_is_reported() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    leaf.add_handler("lost", |_: &Leaf, _: Signal, done: Done| drop(done))
        .unwrap();
    let log = Log::default();
    leaf.add_handler("next", record_into(&log)).unwrap();

    let mut next = leaf.send(Signal::new("next"));
    let mut lost = leaf.send(Signal::new("lost"));
    scheduler.run_until_idle();

    assert!(matches!(
        lost.try_result(),
        Some(Err(LeafError::Abandoned { signal })) if signal == "lost"
    ));
    assert!(matches!(next.try_result(), Some(Ok(()))));
    assert!(!leaf.is_busy());
}

/// A panicking handler is reported as abandoned and the leaf moves on.
#[test]
fn panicking_handler_releases_the_leaf() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    leaf.add_handler("crash", |_: &Leaf, _: Signal, _done: Done| panic!("handler bug"))
        .unwrap();
    let log = Log::default();
    leaf.add_handler("next", record_into(&log)).unwrap();

    let mut crash = leaf.send(Signal::new("crash"));
    let unwound = catch_unwind(AssertUnwindSafe(|| scheduler.run_until_idle()));
    assert!(unwound.is_err());

    assert!(matches!(
        crash.try_result(),
        Some(Err(LeafError::Abandoned { signal })) if signal == "crash"
    ));
    assert!(!leaf.is_busy());

    let mut next = leaf.send(Signal::new("next"));
    scheduler.run_until_idle();
    assert!(matches!(next.try_result(), Some(Ok(()))));
    assert_eq!(*log.lock(), vec!["next"]);
}

/// A panicking broadcast target with nobody listening unwinds normally
/// instead of panicking a second time inside the aggregate callback.
#[test]
fn panicking_broadcast_target_unwinds_once() {
    let scheduler = Arc::new(ManualScheduler::new());
    let hub = leaf_on(&scheduler);
    let spoke = leaf_on(&scheduler);
    spoke
        .add_handler("x", |_: &Leaf, _: Signal, _done: Done| panic!("handler bug"))
        .unwrap();
    hub.connect(&spoke, Callback::default());
    scheduler.run_until_idle();

    hub.broadcast(Signal::new("x"), Callback::default());
    let unwound = catch_unwind(AssertUnwindSafe(|| scheduler.run_until_idle()));
    assert!(unwound.is_err());
    assert!(!spoke.is_busy());

    let mut delivery = hub.broadcast_all(Signal::new("x"));
    let unwound = catch_unwind(AssertUnwindSafe(|| scheduler.run_until_idle()));
    assert!(unwound.is_err());
    assert!(matches!(
        delivery.try_result(),
        Some(Err(LeafError::Abandoned { signal })) if signal == "x"
    ));
    assert!(!spoke.is_busy());
}

/// Registering a name twice fails; removing an unknown name fails.
#[test]
fn registry_misuse_fails_immediately() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let log = Log::default();

    leaf.add_handler("ping", record_into(&log)).unwrap();
    assert!(matches!(
        leaf.add_handler("ping", record_into(&log)),
        Err(LeafError::HandlerAlreadyRegistered(name)) if name == "ping"
    ));
    assert!(matches!(
        leaf.add_handler(CONNECT, record_into(&log)),
        Err(LeafError::HandlerAlreadyRegistered(_))
    ));
    assert!(matches!(
        leaf.remove_handler("pong"),
        Err(LeafError::HandlerNotRegistered(name)) if name == "pong"
    ));

    leaf.remove_handler("ping").unwrap();
    assert!(!leaf.has_handler("ping"));
    assert_eq!(scheduler.pending(), 0);
}

/// `replace_handler` can override the built-in `connect`.
#[test]
fn built_in_handlers_can_be_replaced() {
    let scheduler = Arc::new(ManualScheduler::new());
    let a = leaf_on(&scheduler);
    let b = leaf_on(&scheduler);
    let log = Log::default();
    a.replace_handler(CONNECT, record_into(&log));

    let mut delivery = a.link(&b);
    scheduler.run_until_idle();

    assert!(matches!(delivery.try_result(), Some(Ok(()))));
    assert_eq!(*log.lock(), vec!["connect"]);
    assert!(!a.is_connected_to(&b));
    assert!(b.inputs().is_empty());
}

/// Handlers may register further handlers while the leaf is dispatching.
#[test]
fn handlers_can_install_handlers() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let log = Log::default();

    let late_log = log.clone();
    leaf.add_handler("install", move |leaf: &Leaf, _: Signal, done: Done| {
        match leaf.add_handler("late", record_into(&late_log)) {
            Ok(()) => done.ok(),
            Err(err) => done.fail(err),
        }
    })
    .unwrap();

    let mut installed = leaf.send(Signal::new("install"));
    scheduler.run_until_idle();
    assert!(matches!(installed.try_result(), Some(Ok(()))));

    leaf.signal(Signal::new("late"), Callback::Ignore);
    scheduler.run_until_idle();
    assert_eq!(*log.lock(), vec!["late"]);
}

/// Handlers see the payload of records built from JSON.
#[test]
fn handlers_read_record_fields() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let seen = Arc::new(Mutex::new(None));

    let sink = seen.clone();
    leaf.add_handler("move", move |_: &Leaf, signal: Signal, done: Done| {
        *sink.lock() = signal.field("x").cloned();
        done.ok();
    })
    .unwrap();

    leaf.signal(
        Signal::from_record(json!({"signal": "move", "x": 12})),
        Callback::Ignore,
    );
    scheduler.run_until_idle();

    assert_eq!(*seen.lock(), Some(json!(12)));
}

/// Closures are accepted as callbacks.
#[test]
fn closure_callbacks_receive_the_outcome() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    let outcome = Arc::new(Mutex::new(None));

    let sink = outcome.clone();
    leaf.signal(Signal::unnamed(), move |result: leaf_core::Result<()>| {
        *sink.lock() = Some(result.map_err(|err| err.to_string()));
    });
    scheduler.run_until_idle();

    assert_eq!(
        *outcome.lock(),
        Some(Err("signal is missing its `signal` property".to_string()))
    );
}

/// The default callback panics on error.
#[test]
#[should_panic(expected = "unhandled leaf error")]
fn default_callback_panics_on_error() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);

    leaf.signal(Signal::unnamed(), Callback::default());
    scheduler.run_until_idle();
}

/// Under the `Log` policy the default callback only logs, and the leaf
/// keeps dispatching.
#[test]
fn log_policy_swallows_unhandled_errors() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = Leaf::builder()
        .scheduler(scheduler.clone())
        .unhandled(UnhandledPolicy::Log)
        .build();
    let log = Log::default();
    leaf.add_handler("ping", record_into(&log)).unwrap();

    leaf.signal(Signal::new("ping"), Callback::default());
    leaf.signal(Signal::unnamed(), Callback::default());
    scheduler.run_until_idle();

    assert_eq!(*log.lock(), vec!["ping"]);
}

/// Async handlers need a tokio runtime to run on.
#[test]
fn async_handler_outside_runtime_fails() {
    let scheduler = Arc::new(ManualScheduler::new());
    let leaf = leaf_on(&scheduler);
    leaf.add_async_handler("fetch", |_: Leaf, _: Signal| async { Ok::<(), LeafError>(()) })
        .unwrap();

    let mut delivery = leaf.send(Signal::new("fetch"));
    scheduler.run_until_idle();

    assert!(matches!(
        delivery.try_result(),
        Some(Err(LeafError::NoRuntime { signal })) if signal == "fetch"
    ));
    assert!(!leaf.is_busy());
}
