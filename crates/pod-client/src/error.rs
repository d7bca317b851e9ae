// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for pod-client operations.

use std::collections::BTreeMap;

use crate::value::PodValue;

/// Errors from launching, handshaking with, and calling a pod subprocess.
#[derive(Debug, thiserror::Error)]
pub enum PodError {
    /// Resolving a pod coordinate to an executable failed, or the
    /// `version`/`path` options were used inconsistently.
    #[error("resolver error: {0}")]
    Resolver(String),

    /// The child exited or mis-replied before the describe handshake completed.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// Envelope framing was corrupt, or the stream closed unexpectedly.
    #[error("transport error: {0}")]
    Transport(String),

    /// A payload value failed to encode or decode, or no reader was
    /// registered for an EDN tag, or the negotiated format has no codec.
    #[error("codec error: {0}")]
    Codec(String),

    /// The subprocess reported an `error` status for an invocation.
    #[error("pod error: {message}")]
    Pod {
        /// The `ex-message` string reported by the pod.
        message: String,
        /// Decoded `ex-data`, if any.
        data: Option<PodValue>,
    },

    /// The pod was destroyed while a call was still outstanding.
    #[error("pod terminated")]
    PodTerminated,

    /// An invocation exceeded its deadline.
    #[error("operation timed out")]
    Timeout,

    /// Low-level process I/O failure.
    #[error("process I/O error: {0}")]
    Io(#[source] std::io::Error),
}

impl PodError {
    /// Build a [`PodError::Pod`] from the wire-level `ex-message`/`ex-data` fields.
    pub fn from_pod_reply(message: impl Into<String>, data: Option<PodValue>) -> Self {
        PodError::Pod {
            message: message.into(),
            data,
        }
    }

    /// Best-effort data map accessor, for callers that want `ex-data` as a
    /// map keyed by plain string. [`PodValue::Map`] keys a `Str` or
    /// `Keyword` entry by its literal/plain name; any other key shape is
    /// dropped rather than making the whole map unusable.
    pub fn data_map(&self) -> Option<BTreeMap<String, PodValue>> {
        match self {
            PodError::Pod {
                data: Some(PodValue::Map(pairs)),
                ..
            } => Some(
                pairs
                    .iter()
                    .filter_map(|(k, v)| {
                        let key = match k {
                            PodValue::Str(s) => Some(s.clone()),
                            PodValue::Keyword(ident) => Some(ident.name.clone()),
                            _ => None,
                        };
                        key.map(|key| (key, v.clone()))
                    })
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PodError {
    fn from(e: std::io::Error) -> Self {
        PodError::Io(e)
    }
}
