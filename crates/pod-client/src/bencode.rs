// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bencode envelope codec: encode/decode the length-prefixed,
//! self-describing dictionaries that frame every message on the wire.

use std::collections::BTreeMap;

use bendy::decoding::{Decoder, Object};
use bendy::encoding::{Error as EncodeError, SingleItemEncoder, ToBencode};

use crate::error::PodError;

/// A bencode value: integer, byte string, ordered list, or dictionary
/// with lexically ordered keys (`BTreeMap` gives us the ordering for
/// free on encode).
#[derive(Debug, Clone, PartialEq)]
pub enum BValue {
    /// A bencode integer.
    Int(i64),
    /// A bencode byte string.
    Bytes(Vec<u8>),
    /// A bencode list.
    List(Vec<BValue>),
    /// A bencode dictionary.
    Dict(BTreeMap<String, BValue>),
}

/// One top-level envelope: a flat dictionary of wire field names to values.
pub type Envelope = BTreeMap<String, BValue>;

impl BValue {
    /// A UTF-8 string as a bencode byte string.
    pub fn text(s: impl Into<String>) -> Self {
        BValue::Bytes(s.into().into_bytes())
    }

    /// A boolean encoded the wire way: the literal strings `"true"`/`"false"`.
    pub fn boolean(b: bool) -> Self {
        BValue::text(if b { "true" } else { "false" })
    }
}

impl ToBencode for BValue {
    const MAX_DEPTH: usize = 16;

    fn encode(&self, encoder: SingleItemEncoder) -> Result<(), EncodeError> {
        match self {
            BValue::Int(i) => encoder.emit_int(*i),
            BValue::Bytes(b) => encoder.emit_bytes(b),
            BValue::List(items) => encoder.emit_list(|list| {
                for item in items {
                    list.emit(item)?;
                }
                Ok(())
            }),
            BValue::Dict(map) => encoder.emit_dict(|mut dict| {
                // `BTreeMap` iterates in key order, which is exactly the
                // lexical ordering bencode dictionaries require.
                for (k, v) in map {
                    dict.emit_pair(k.as_bytes(), v)?;
                }
                Ok(())
            }),
        }
    }
}

fn object_to_bvalue(object: Object<'_, '_>) -> Result<BValue, PodError> {
    match object {
        Object::Integer(s) => s
            .parse::<i64>()
            .map(BValue::Int)
            .map_err(|e| PodError::Transport(format!("invalid integer in envelope: {e}"))),
        Object::Bytes(b) => Ok(BValue::Bytes(b.to_vec())),
        Object::List(mut list) => {
            let mut items = Vec::new();
            while let Some(item) = list
                .next_object()
                .map_err(|e| PodError::Transport(format!("malformed list in envelope: {e}")))?
            {
                items.push(object_to_bvalue(item)?);
            }
            Ok(BValue::List(items))
        }
        Object::Dict(mut dict) => {
            let mut map = BTreeMap::new();
            while let Some((k, v)) = dict
                .next_pair()
                .map_err(|e| PodError::Transport(format!("malformed dict in envelope: {e}")))?
            {
                map.insert(String::from_utf8_lossy(k).into_owned(), object_to_bvalue(v)?);
            }
            Ok(BValue::Dict(map))
        }
    }
}

/// Decode one envelope from the front of `bytes`. Returns `None` for
/// a clean end-of-stream (no bytes at all); a truncated bencode value
/// mid-buffer is a [`PodError::Transport`], never a silent `None`.
pub fn decode_envelope(bytes: &[u8]) -> Result<Option<Envelope>, PodError> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let mut decoder = Decoder::new(bytes);
    let object = decoder
        .next_object()
        .map_err(|e| PodError::Transport(format!("malformed envelope: {e}")))?;
    let Some(object) = object else {
        return Ok(None);
    };
    match object_to_bvalue(object)? {
        BValue::Dict(map) => Ok(Some(map)),
        _ => Err(PodError::Transport(
            "top-level envelope is not a dictionary".into(),
        )),
    }
}

/// Encode a dictionary to a single bencode byte buffer, ready for one
/// atomic write.
pub fn encode_envelope(envelope: &Envelope) -> Result<Vec<u8>, PodError> {
    BValue::Dict(envelope.clone())
        .to_bencode()
        .map_err(|e| PodError::Transport(format!("failed to encode envelope: {e}")))
}

/// Read a required field as a UTF-8 string.
pub fn get_string(envelope: &Envelope, key: &str) -> Result<String, PodError> {
    match envelope.get(key) {
        Some(BValue::Bytes(b)) => String::from_utf8(b.clone())
            .map_err(|e| PodError::Transport(format!("field `{key}` is not valid UTF-8: {e}"))),
        Some(_) => Err(PodError::Transport(format!(
            "field `{key}` is not a byte string"
        ))),
        None => Err(PodError::Transport(format!(
            "envelope missing required field `{key}`"
        ))),
    }
}

/// Read an optional field as a UTF-8 string; missing is `None`.
pub fn get_maybe_string(envelope: &Envelope, key: &str) -> Option<String> {
    match envelope.get(key) {
        Some(BValue::Bytes(b)) => Some(String::from_utf8_lossy(b).into_owned()),
        _ => None,
    }
}

/// Read a boolean field in its wire form (`"true"`/`"false"`); missing is `false`.
pub fn get_bool(envelope: &Envelope, key: &str) -> bool {
    get_maybe_string(envelope, key).as_deref() == Some("true")
}

/// Read a field as a list, if present and list-shaped.
pub fn get_list<'a>(envelope: &'a Envelope, key: &str) -> Option<&'a [BValue]> {
    match envelope.get(key) {
        Some(BValue::List(items)) => Some(items.as_slice()),
        _ => None,
    }
}
