// SPDX-License-Identifier: MIT OR Apache-2.0
//! Call registry: correlation-id → waiter mapping, future-like
//! completion, and teardown cancellation.
//!
//! Callers must register a waiter *before* writing the corresponding
//! request envelope, so a reply racing the write can never arrive
//! before its slot exists.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;
use uuid::Uuid;

use crate::error::PodError;
use crate::value::PodValue;

/// One value delivered to a streaming waiter, or its terminal signal.
#[derive(Debug)]
pub enum StreamEvent {
    /// A value from a streamed invocation.
    Value(PodValue),
    /// A terminal error.
    Error(PodError),
    /// Terminal completion with no further values.
    Done,
}

enum Slot {
    OneShot(oneshot::Sender<Result<PodValue, PodError>>),
    Streaming(mpsc::Sender<StreamEvent>),
}

/// A handle a caller uses to await completion of an invoke: either a
/// one-shot future, or a stream of [`StreamEvent`]s for callback-style
/// (multi-value) invocations.
pub enum Waiter {
    /// Settles once with a value or an error.
    OneShot(oneshot::Receiver<Result<PodValue, PodError>>),
    /// May yield multiple values before a terminal `Done`/`Error`.
    Streaming(ReceiverStream<StreamEvent>),
}

/// Correlation-id → waiter mapping for one pod.
///
/// Invariant: a correlation id is never reused within a pod (ids are
/// random UUIDv4 strings) and, while present in the map, has exactly
/// one in-flight request behind it.
#[derive(Default)]
pub struct CallRegistry {
    chans: Mutex<HashMap<String, Slot>>,
}

impl CallRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a one-shot future waiter under a fresh correlation id.
    pub fn register_oneshot(&self) -> (String, Waiter) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.chans.lock().unwrap().insert(id.clone(), Slot::OneShot(tx));
        (id, Waiter::OneShot(rx))
    }

    /// Register a streaming waiter under a fresh correlation id.
    pub fn register_streaming(&self) -> (String, Waiter) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(64);
        self.chans
            .lock()
            .unwrap()
            .insert(id.clone(), Slot::Streaming(tx));
        (id, Waiter::Streaming(ReceiverStream::new(rx)))
    }

    /// Deliver a successful value to the waiter registered under `id`.
    ///
    /// For a one-shot waiter this is terminal and removes the entry
    /// regardless of whether the envelope also carried `done`; for a
    /// streaming waiter the entry survives until [`Self::note_done`]
    /// or [`Self::fail`].
    pub fn resolve(&self, id: &str, value: PodValue) {
        self.deliver(id, Ok(value));
    }

    /// Fail the waiter registered under `id`; terminal for both waiter kinds.
    pub fn fail(&self, id: &str, error: PodError) {
        let mut chans = self.chans.lock().unwrap();
        match chans.remove(id) {
            Some(Slot::OneShot(tx)) => {
                let _ = tx.send(Err(error));
            }
            Some(Slot::Streaming(tx)) => {
                let _ = tx.try_send(StreamEvent::Error(error));
            }
            None => {
                warn!(target: "pod_client.registry", id, "dropping error for unknown correlation id");
            }
        }
    }

    /// Signal completion with no further values. Settles a one-shot
    /// waiter that never received a value with [`PodValue::Nil`].
    pub fn note_done(&self, id: &str) {
        let slot = self.chans.lock().unwrap().remove(id);
        match slot {
            Some(Slot::OneShot(tx)) => {
                let _ = tx.send(Ok(PodValue::Nil));
            }
            Some(Slot::Streaming(tx)) => {
                let _ = tx.try_send(StreamEvent::Done);
            }
            None => {}
        }
    }

    fn deliver(&self, id: &str, result: Result<PodValue, PodError>) {
        let mut chans = self.chans.lock().unwrap();
        match chans.get(id) {
            Some(Slot::OneShot(_)) => {
                if let Some(Slot::OneShot(tx)) = chans.remove(id) {
                    let _ = tx.send(result);
                }
            }
            Some(Slot::Streaming(tx)) => {
                let event = match result {
                    Ok(v) => StreamEvent::Value(v),
                    Err(e) => StreamEvent::Error(e),
                };
                let _ = tx.try_send(event);
            }
            None => {
                warn!(target: "pod_client.registry", id, "dropping reply for unknown correlation id");
            }
        }
    }

    /// Remove the waiter registered under `id` without notifying it.
    pub fn discard(&self, id: &str) -> bool {
        self.chans.lock().unwrap().remove(id).is_some()
    }

    /// Remove and fail every outstanding waiter, each with a fresh
    /// error from `make_error`. Used by `destroy`.
    pub fn fail_all(&self, make_error: impl Fn() -> PodError) {
        let slots: Vec<_> = self.chans.lock().unwrap().drain().collect();
        for (_, slot) in slots {
            match slot {
                Slot::OneShot(tx) => {
                    let _ = tx.send(Err(make_error()));
                }
                Slot::Streaming(tx) => {
                    let _ = tx.try_send(StreamEvent::Error(make_error()));
                }
            }
        }
    }

    /// Number of in-flight calls.
    pub fn len(&self) -> usize {
        self.chans.lock().unwrap().len()
    }

    /// `true` if there are no in-flight calls.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
