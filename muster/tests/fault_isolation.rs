//! A misbehaving extension never takes the engine or its peers down.

use muster::{
    ActivityStatus, EndReason, hooks::FnExtension, testing::RecordingExtension,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

mod common;
use common::{race, recorded};

#[tokio::test]
async fn test_panicking_gate_is_treated_as_allow() {
    let (core, log) = recorded(&[]);
    core.register(RecordingExtension::new("faulty", 1, &log).panic_on("pre_start"))
        .unwrap();
    core.register(RecordingExtension::new("after", 2, &log)).unwrap();

    let id = core.create(race("Resilient")).await.unwrap();
    core.start(id).await.unwrap();

    assert_eq!(core.get(id).await.unwrap().status(), ActivityStatus::Active);
    assert_eq!(
        log.calls_to("pre_start"),
        vec!["faulty:pre_start", "after:pre_start"]
    );
    let controller = core.controller().await.unwrap();
    assert_eq!(controller.dispatcher().fault_count(), 1);
}

#[tokio::test]
async fn test_panicking_closure_gate_is_treated_as_allow() {
    let (core, _log) = recorded(&[]);
    core.register(
        FnExtension::new("broken").on_pre_join(|_, _| -> muster::Verdict {
            panic!("lookup table missing")
        }),
    )
    .unwrap();

    let id = core.create(race("Open door")).await.unwrap();
    core.join(id, "p1".into()).await.unwrap();
    assert!(core.get(id).await.unwrap().has_participant(&"p1".into()));
}

#[tokio::test]
async fn test_failing_notify_does_not_block_later_extensions() {
    let (core, log) = recorded(&[]);
    core.register(RecordingExtension::new("noisy", 1, &log).fail_on_notify())
        .unwrap();
    core.register(RecordingExtension::new("quiet", 2, &log)).unwrap();

    let id = core.create(race("Chatter")).await.unwrap();
    core.join(id, "p1".into()).await.unwrap();

    assert_eq!(log.calls_to("created"), vec!["noisy:created", "quiet:created"]);
    assert_eq!(log.calls_to("joined"), vec!["noisy:joined:p1", "quiet:joined:p1"]);
}

#[tokio::test]
async fn test_panicking_notify_does_not_block_later_extensions() {
    let (core, log) = recorded(&[]);
    core.register(RecordingExtension::new("boom", 1, &log).panic_on("started"))
        .unwrap();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    core.register(
        FnExtension::new("counter")
            .with_priority(2)
            .on_started(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
    )
    .unwrap();

    let id = core.create(race("Kaboom")).await.unwrap();
    core.start(id).await.unwrap();

    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_faulted_update_cannot_end_activity() {
    let (core, log) = recorded(&[]);
    core.register(
        RecordingExtension::new("flaky-timer", 0, &log)
            .end_on_update(EndReason::Timeout)
            .panic_on("update"),
    )
    .unwrap();

    let id = core.create(race("Survivor")).await.unwrap();
    core.start(id).await.unwrap();

    // The panic fires before the request is recorded, so nothing ends.
    assert_eq!(core.tick(id).await.unwrap(), None);
    assert_eq!(core.get(id).await.unwrap().status(), ActivityStatus::Active);
}

#[tokio::test]
async fn test_erroring_update_discards_its_end_request() {
    let (core, log) = recorded(&[]);
    core.register(
        RecordingExtension::new("half-done", 0, &log)
            .end_on_update(EndReason::Completed)
            .fail_on_notify(),
    )
    .unwrap();

    let id = core.create(race("Half done")).await.unwrap();
    core.start(id).await.unwrap();

    assert_eq!(core.tick(id).await.unwrap(), None);
    assert_eq!(core.get(id).await.unwrap().status(), ActivityStatus::Active);
    assert!(log.calls_to("ended").is_empty());
}

#[tokio::test]
async fn test_faulting_shutdown_still_reaches_everyone() {
    let (core, log) = recorded(&[]);
    core.register(RecordingExtension::new("first", 0, &log).panic_on("shutdown"))
        .unwrap();
    core.register(RecordingExtension::new("second", 1, &log)).unwrap();

    core.shutdown().await.unwrap();

    assert_eq!(
        log.calls_to("shutdown"),
        vec!["first:shutdown", "second:shutdown"]
    );
    assert!(core.registry().is_empty());
}
