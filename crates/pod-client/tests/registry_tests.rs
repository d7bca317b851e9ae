// SPDX-License-Identifier: MIT OR Apache-2.0
//! Call registry multiplexing tests.

use pod_client::registry::{CallRegistry, StreamEvent, Waiter};
use pod_client::{PodError, PodValue};
use tokio_stream::StreamExt;

#[tokio::test]
async fn oneshot_resolve_settles_with_value() {
    let registry = CallRegistry::new();
    let (id, waiter) = registry.register_oneshot();
    registry.resolve(&id, PodValue::Int(42));

    let Waiter::OneShot(rx) = waiter else {
        panic!("expected a OneShot waiter");
    };
    assert_eq!(rx.await.unwrap().unwrap(), PodValue::Int(42));
}

#[tokio::test]
async fn oneshot_first_delivery_is_terminal() {
    let registry = CallRegistry::new();
    let (id, waiter) = registry.register_oneshot();
    registry.resolve(&id, PodValue::Int(1));
    // A second reply for the same id has nowhere to land; it is
    // dropped with a warning rather than panicking.
    registry.resolve(&id, PodValue::Int(2));

    let Waiter::OneShot(rx) = waiter else {
        panic!("expected a OneShot waiter");
    };
    assert_eq!(rx.await.unwrap().unwrap(), PodValue::Int(1));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn oneshot_note_done_without_value_settles_nil() {
    let registry = CallRegistry::new();
    let (id, waiter) = registry.register_oneshot();
    registry.note_done(&id);

    let Waiter::OneShot(rx) = waiter else {
        panic!("expected a OneShot waiter");
    };
    assert_eq!(rx.await.unwrap().unwrap(), PodValue::Nil);
}

#[tokio::test]
async fn oneshot_fail_delivers_error() {
    let registry = CallRegistry::new();
    let (id, waiter) = registry.register_oneshot();
    registry.fail(&id, PodError::PodTerminated);

    let Waiter::OneShot(rx) = waiter else {
        panic!("expected a OneShot waiter");
    };
    assert!(matches!(rx.await.unwrap(), Err(PodError::PodTerminated)));
}

#[tokio::test]
async fn streaming_delivers_values_then_done() {
    let registry = CallRegistry::new();
    let (id, waiter) = registry.register_streaming();
    registry.resolve(&id, PodValue::Int(1));
    registry.resolve(&id, PodValue::Int(2));
    registry.note_done(&id);

    let Waiter::Streaming(stream) = waiter else {
        panic!("expected a Streaming waiter");
    };
    let events: Vec<StreamEvent> = stream.collect().await;
    assert!(matches!(events[0], StreamEvent::Value(PodValue::Int(1))));
    assert!(matches!(events[1], StreamEvent::Value(PodValue::Int(2))));
    assert!(matches!(events[2], StreamEvent::Done));
}

#[tokio::test]
async fn streaming_fail_is_terminal() {
    let registry = CallRegistry::new();
    let (id, waiter) = registry.register_streaming();
    registry.resolve(&id, PodValue::Int(1));
    registry.fail(&id, PodError::Timeout);

    let Waiter::Streaming(stream) = waiter else {
        panic!("expected a Streaming waiter");
    };
    let events: Vec<StreamEvent> = stream.collect().await;
    assert_eq!(events.len(), 2);
    assert!(matches!(events[1], StreamEvent::Error(PodError::Timeout)));
    assert!(registry.is_empty());
}

#[tokio::test]
async fn unknown_correlation_id_is_dropped_silently() {
    let registry = CallRegistry::new();
    // No waiter registered for "ghost"; these must not panic.
    registry.resolve("ghost", PodValue::Nil);
    registry.fail("ghost", PodError::Timeout);
    registry.note_done("ghost");
    assert!(registry.is_empty());
}

#[tokio::test]
async fn discard_removes_without_notifying() {
    let registry = CallRegistry::new();
    let (id, _waiter) = registry.register_oneshot();
    assert!(registry.discard(&id));
    assert!(!registry.discard(&id));
}

#[tokio::test]
async fn fail_all_drains_every_outstanding_waiter() {
    let registry = CallRegistry::new();
    let (id1, waiter1) = registry.register_oneshot();
    let (id2, waiter2) = registry.register_streaming();
    assert_eq!(registry.len(), 2);

    registry.fail_all(|| PodError::PodTerminated);
    assert!(registry.is_empty());

    let Waiter::OneShot(rx1) = waiter1 else {
        panic!("expected OneShot")
    };
    assert!(matches!(rx1.await.unwrap(), Err(PodError::PodTerminated)));

    let Waiter::Streaming(stream2) = waiter2 else {
        panic!("expected Streaming")
    };
    let events: Vec<StreamEvent> = stream2.collect().await;
    assert!(matches!(events[0], StreamEvent::Error(PodError::PodTerminated)));

    let _ = id1;
    let _ = id2;
}
