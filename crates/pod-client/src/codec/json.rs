// SPDX-License-Identifier: MIT OR Apache-2.0
//! JSON payload codec.

use serde_json::Value;

use super::PayloadCodec;
use crate::error::PodError;
use crate::value::PodValue;

/// Standard JSON payload codec.
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn read(&self, s: &str) -> Result<PodValue, PodError> {
        let value: Value =
            serde_json::from_str(s).map_err(|e| PodError::Codec(format!("invalid json: {e}")))?;
        Ok(json_to_pod(value))
    }

    fn write(&self, value: &PodValue) -> Result<String, PodError> {
        let json = pod_to_json(value)?;
        serde_json::to_string(&json)
            .map_err(|e| PodError::Codec(format!("failed to encode json: {e}")))
    }
}

fn json_to_pod(value: Value) -> PodValue {
    match value {
        Value::Null => PodValue::Nil,
        Value::Bool(b) => PodValue::Bool(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => PodValue::Int(i),
            None => PodValue::Float(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => PodValue::Str(s),
        Value::Array(items) => PodValue::Seq(items.into_iter().map(json_to_pod).collect()),
        Value::Object(map) => PodValue::Map(
            map.into_iter()
                .map(|(k, v)| (PodValue::Str(k), json_to_pod(v)))
                .collect(),
        ),
    }
}

fn pod_to_json(value: &PodValue) -> Result<Value, PodError> {
    Ok(match value {
        PodValue::Nil => Value::Null,
        PodValue::Bool(b) => Value::Bool(*b),
        PodValue::Int(i) => Value::Number((*i).into()),
        PodValue::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        PodValue::Str(s) => Value::String(s.clone()),
        PodValue::Keyword(ident) => Value::String(format!(":{ident}")),
        PodValue::Symbol(ident) => Value::String(ident.to_string()),
        PodValue::Seq(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(pod_to_json(item)?);
            }
            Value::Array(out)
        }
        PodValue::Map(pairs) => {
            let mut obj = serde_json::Map::new();
            for (k, v) in pairs {
                let key = match k {
                    PodValue::Str(s) => s.clone(),
                    PodValue::Keyword(ident) => ident.name.clone(),
                    other => {
                        return Err(PodError::Codec(format!(
                            "json maps require string or keyword keys, got {other:?}"
                        )));
                    }
                };
                obj.insert(key, pod_to_json(v)?);
            }
            Value::Object(obj)
        }
    })
}
