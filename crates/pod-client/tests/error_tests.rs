// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error-path tests for `pod-client`.

use std::error::Error as StdError;

use pod_client::{PodError, PodValue};

#[test]
fn from_pod_reply_carries_message_and_data() {
    let data = PodValue::map([(PodValue::from("reason"), PodValue::from("bad args"))]);
    let err = PodError::from_pod_reply("invocation failed", Some(data));
    match &err {
        PodError::Pod { message, data } => {
            assert_eq!(message, "invocation failed");
            assert!(data.is_some());
        }
        other => panic!("expected Pod, got {other:?}"),
    }
}

#[test]
fn data_map_extracts_map_shaped_data() {
    let data = PodValue::map([(PodValue::from("code"), PodValue::Int(7))]);
    let err = PodError::from_pod_reply("oops", Some(data));
    let map = err.data_map().expect("data_map should extract the map");
    assert_eq!(map.len(), 1);
}

#[test]
fn data_map_is_none_for_non_map_data() {
    let err = PodError::from_pod_reply("oops", Some(PodValue::Str("just a string".into())));
    assert!(err.data_map().is_none());
}

#[test]
fn data_map_is_none_without_data() {
    let err = PodError::from_pod_reply("oops", None);
    assert!(err.data_map().is_none());
}

#[test]
fn io_error_preserves_source() {
    let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe broke");
    let err = PodError::from(io_err);
    let src = err.source().expect("Io should expose source");
    assert!(src.to_string().contains("pipe broke"));
}

#[test]
fn non_io_variants_have_no_source() {
    let variants = vec![
        PodError::Resolver("r".into()),
        PodError::Handshake("h".into()),
        PodError::Transport("t".into()),
        PodError::Codec("c".into()),
        PodError::from_pod_reply("p", None),
        PodError::PodTerminated,
        PodError::Timeout,
    ];
    for v in &variants {
        assert!(v.source().is_none(), "unexpected source for {v:?}");
    }
}

fn _assert_send<T: Send>() {}
fn _assert_sync<T: Sync>() {}

#[test]
fn error_is_send_and_sync() {
    _assert_send::<PodError>();
    _assert_sync::<PodError>();
}

#[test]
fn all_variants_have_nonempty_display() {
    let io_err = || std::io::Error::new(std::io::ErrorKind::Other, "test");
    let variants = vec![
        PodError::Resolver("bad coordinate".into()),
        PodError::Handshake("no describe reply".into()),
        PodError::Transport("truncated envelope".into()),
        PodError::Codec("unsupported format".into()),
        PodError::from_pod_reply("exploded", None),
        PodError::PodTerminated,
        PodError::Timeout,
        PodError::from(io_err()),
    ];
    for v in &variants {
        let msg = v.to_string();
        assert!(!msg.is_empty(), "empty display for {v:?}");
    }
}

/// Ensures the match covers every `PodError` variant; a new variant
/// breaks this test's compilation until it's handled here too.
#[test]
fn error_match_is_exhaustive() {
    let e = PodError::Timeout;
    match e {
        PodError::Resolver(_) => {}
        PodError::Handshake(_) => {}
        PodError::Transport(_) => {}
        PodError::Codec(_) => {}
        PodError::Pod { .. } => {}
        PodError::PodTerminated => {}
        PodError::Timeout => {}
        PodError::Io(_) => {}
    }
}
