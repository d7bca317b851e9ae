// SPDX-License-Identifier: MIT OR Apache-2.0
//! Payload codecs: EDN, JSON, and (optionally) Transit+JSON readers/writers
//! for the value-carrying wire strings (`args`, `value`, `ex-data`, var `meta`).

pub mod edn;
pub mod json;
pub mod transit;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::PodError;
use crate::value::PodValue;

/// The payload format negotiated with a pod for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    /// Default format; the wire name is `edn`.
    Edn,
    /// Plain JSON.
    Json,
    /// Transit encoded as JSON.
    TransitJson,
}

impl PayloadFormat {
    /// Parse a describe reply's `format` string, defaulting to EDN for
    /// an absent or unrecognized value.
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("json") => PayloadFormat::Json,
            Some("transit+json") => PayloadFormat::TransitJson,
            _ => PayloadFormat::Edn,
        }
    }
}

/// A tag handler invoked on EDN tagged-literal values during decode.
///
/// Resolved once per pod, from the caller-supplied `resolve` option in
/// [`crate::spec::LoadOptions`] applied to each tag symbol the pod's
/// describe reply names in `readers`.
pub type TagReader = Arc<dyn Fn(PodValue) -> Result<PodValue, PodError> + Send + Sync>;

/// A payload codec: converts between the shared value domain and the
/// wire string carried in `args`/`value`/`ex-data`/var `meta`.
pub trait PayloadCodec: Send + Sync {
    /// Decode a wire string into a value.
    fn read(&self, s: &str) -> Result<PodValue, PodError>;
    /// Encode a value into a wire string.
    fn write(&self, value: &PodValue) -> Result<String, PodError>;
}

/// Construct the codec for a negotiated format, given its resolved tag readers.
///
/// Transit+JSON has no implementation available in this build; a pod
/// that negotiates it fails to load with a codec error, matching the
/// optional-codec contract.
pub fn codec_for(
    format: PayloadFormat,
    readers: BTreeMap<String, TagReader>,
) -> Result<Box<dyn PayloadCodec>, PodError> {
    match format {
        PayloadFormat::Edn => Ok(Box::new(edn::EdnCodec::new(readers))),
        PayloadFormat::Json => Ok(Box::new(json::JsonCodec)),
        PayloadFormat::TransitJson => Err(PodError::Codec(
            "pod negotiated transit+json, which this build does not support".into(),
        )),
    }
}
