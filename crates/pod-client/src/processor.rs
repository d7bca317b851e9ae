// SPDX-License-Identifier: MIT OR Apache-2.0
//! Processor loop: the single per-pod task that reads envelopes from
//! the read stream and demultiplexes them to waiters.

use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{trace, warn};

use crate::bencode::{BValue, Envelope, decode_envelope, get_list, get_maybe_string};
use crate::error::PodError;
use crate::namespace::Namespace;
use crate::pod::Pod;
use crate::transport::ReadHalf;
use crate::value::PodValue;

/// Spawn the processor task for `pod`, consuming `reader` until EOF.
///
/// `initial_buf` carries any bytes already read past the describe
/// reply during the handshake, so nothing pipelined by the pod right
/// after its reply is lost.
pub fn spawn(pod: Arc<Pod>, reader: ReadHalf, initial_buf: Vec<u8>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(run(pod, reader, initial_buf))
}

/// Read and decode exactly one envelope from `reader`, consuming from
/// (and growing) `buf` as needed. Used both by the handshake, before
/// the processor task exists, and — via `scan_value`/`decode_envelope`
/// — by the processor loop itself.
pub(crate) async fn read_one_envelope(
    reader: &mut ReadHalf,
    buf: &mut Vec<u8>,
) -> Result<Envelope, PodError> {
    let mut chunk = [0u8; 8192];
    loop {
        if let Some(end) = scan_value(buf, 0)? {
            let envelope = decode_envelope(&buf[..end])?
                .expect("scan_value only reports complete, non-empty values");
            buf.drain(..end);
            return Ok(envelope);
        }
        match reader.read(&mut chunk).await {
            Ok(0) => return Err(PodError::Handshake("pod closed its stream before replying".into())),
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => return Err(PodError::Handshake(format!("failed to read from pod: {e}"))),
        }
    }
}

async fn run(pod: Arc<Pod>, mut reader: ReadHalf, mut buf: Vec<u8>) {
    let mut chunk = [0u8; 8192];

    loop {
        match scan_value(&buf, 0) {
            Ok(Some(end)) => {
                let envelope = match decode_envelope(&buf[..end]) {
                    Ok(Some(envelope)) => envelope,
                    Ok(None) => unreachable!("scan_value only reports complete, non-empty values"),
                    Err(e) => {
                        pod.registry.fail_all(|| PodError::Transport(e.to_string()));
                        return;
                    }
                };
                buf.drain(..end);
                handle_envelope(&pod, envelope).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                pod.registry.fail_all(|| PodError::Transport(e.to_string()));
                return;
            }
        }

        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                pod.registry
                    .fail_all(|| PodError::Transport(format!("read error: {e}")));
                return;
            }
        }
    }

    // End-of-stream is normal once `destroy` has been initiated;
    // otherwise every remaining waiter fails with a pod-crashed error.
    if !pod.is_destroying() {
        pod.registry
            .fail_all(|| PodError::Transport("pod exited unexpectedly".into()));
    }
}

/// Find the end offset of one complete top-level bencode value
/// starting at `pos`, without allocating a decoder — bencode's four
/// primitives (`i...e`, `N:...`, `l...e`, `d...e`) each self-delimit,
/// so this only needs to track string lengths and list/dict nesting.
/// Returns `Ok(None)` when `buf` doesn't yet hold a complete value.
fn scan_value(buf: &[u8], pos: usize) -> Result<Option<usize>, PodError> {
    if pos >= buf.len() {
        return Ok(None);
    }
    match buf[pos] {
        b'i' => match buf[pos..].iter().position(|&b| b == b'e') {
            Some(i) => Ok(Some(pos + i + 1)),
            None => Ok(None),
        },
        b'd' | b'l' => {
            let mut cur = pos + 1;
            loop {
                if cur >= buf.len() {
                    return Ok(None);
                }
                if buf[cur] == b'e' {
                    return Ok(Some(cur + 1));
                }
                match scan_value(buf, cur)? {
                    Some(next) => cur = next,
                    None => return Ok(None),
                }
            }
        }
        b'0'..=b'9' => {
            let colon = match buf[pos..].iter().position(|&b| b == b':') {
                Some(i) => pos + i,
                None => return Ok(None),
            };
            let len_str = std::str::from_utf8(&buf[pos..colon])
                .map_err(|e| PodError::Transport(format!("invalid byte-string length: {e}")))?;
            let len: usize = len_str
                .parse()
                .map_err(|e| PodError::Transport(format!("invalid byte-string length: {e}")))?;
            let data_end = colon + 1 + len;
            if data_end > buf.len() {
                Ok(None)
            } else {
                Ok(Some(data_end))
            }
        }
        other => Err(PodError::Transport(format!(
            "unexpected byte 0x{other:02x} framing an envelope"
        ))),
    }
}

async fn handle_envelope(pod: &Arc<Pod>, envelope: Envelope) {
    let Some(id) = get_maybe_string(&envelope, "id") else {
        trace!(target: "pod_client.processor", "discarding envelope with no id");
        forward_sinks(pod, &envelope).await;
        return;
    };

    forward_sinks(pod, &envelope).await;

    // A namespace-resolution reply (from `load-ns`) carries a `vars`
    // list and a `name`; translate and store it rather than treating
    // it as an ordinary value reply.
    if let Some(name) = get_maybe_string(&envelope, "name")
        && envelope.contains_key("vars")
    {
        match Namespace::from_envelope(&envelope, pod.codec.as_ref()) {
            Ok(ns) => {
                let mut namespaces = pod.namespaces.write().await;
                if let Some(existing) = namespaces.iter_mut().find(|n| n.name == name) {
                    existing.vars = ns.vars;
                    existing.deferred = false;
                } else {
                    namespaces.push(ns);
                }
                drop(namespaces);
                pod.registry.resolve(&id, PodValue::Nil);
            }
            Err(e) => pod.registry.fail(&id, e),
        }
        return;
    }

    let status: Vec<String> = get_list(&envelope, "status")
        .map(|items| {
            items
                .iter()
                .filter_map(|v| match v {
                    BValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    let has_error_status = status.iter().any(|s| s == "error");
    let done = has_error_status || status.iter().any(|s| s == "done");

    if has_error_status || envelope.contains_key("ex-message") {
        let message =
            get_maybe_string(&envelope, "ex-message").unwrap_or_else(|| "pod error".into());
        let data = get_maybe_string(&envelope, "ex-data").and_then(|s| pod.codec.read(&s).ok());
        pod.registry.fail(&id, PodError::from_pod_reply(message, data));
    } else if let Some(value_str) = get_maybe_string(&envelope, "value") {
        match pod.codec.read(&value_str) {
            Ok(value) => pod.registry.resolve(&id, value),
            Err(e) => pod.registry.fail(&id, e),
        }
    }

    if done {
        pod.registry.note_done(&id);
    }
}

async fn forward_sinks(pod: &Arc<Pod>, envelope: &Envelope) {
    if let Some(out) = get_maybe_string(envelope, "out") {
        let mut sink = pod.out_sink.lock().await;
        if let Err(e) = sink.write_all(out.as_bytes()).await {
            warn!(target: "pod_client.sink", error = %e, "failed to forward pod stdout");
        }
        let _ = sink.flush().await;
    }
    if let Some(err) = get_maybe_string(envelope, "err") {
        let mut sink = pod.err_sink.lock().await;
        if let Err(e) = sink.write_all(err.as_bytes()).await {
            warn!(target: "pod_client.sink", error = %e, "failed to forward pod stderr");
        }
        let _ = sink.flush().await;
    }
}
