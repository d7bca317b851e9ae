// SPDX-License-Identifier: MIT OR Apache-2.0
//! EDN payload codec.
//!
//! Reading goes through `edn_rs`. Writing is hand-rolled: EDN has no
//! single canonical serializer crate the way JSON has `serde_json`, so
//! [`EdnCodec::write`] walks a [`PodValue`] directly to EDN syntax.

use std::collections::BTreeMap;

use edn_rs::Edn;

use super::{PayloadCodec, TagReader};
use crate::error::PodError;
use crate::value::{Ident, PodValue};

/// EDN payload codec with an optional set of tag-literal readers,
/// resolved once at pod load time from the describe reply's `readers`
/// map.
pub struct EdnCodec {
    readers: BTreeMap<String, TagReader>,
}

impl EdnCodec {
    /// Build a codec with the given tag → reader-function map.
    pub fn new(readers: BTreeMap<String, TagReader>) -> Self {
        Self { readers }
    }
}

impl PayloadCodec for EdnCodec {
    fn read(&self, s: &str) -> Result<PodValue, PodError> {
        let edn: Edn = s
            .parse()
            .map_err(|e| PodError::Codec(format!("invalid edn: {e:?}")))?;
        edn_to_pod(edn, &self.readers)
    }

    fn write(&self, value: &PodValue) -> Result<String, PodError> {
        let mut out = String::new();
        write_edn(value, &mut out)?;
        Ok(out)
    }
}

fn ident_from_token(token: &str) -> Ident {
    Ident::parse(token.trim_start_matches(':'))
}

/// Convert a parsed EDN value into the shared domain.
///
/// Associative literals (maps) and sequential literals (vectors,
/// lists, sets) collapse to [`PodValue::Map`]/[`PodValue::Seq`]
/// respectively; namespace-qualified symbols and keywords keep their
/// qualifier in [`Ident`] rather than dropping it.
fn edn_to_pod(edn: Edn, readers: &BTreeMap<String, TagReader>) -> Result<PodValue, PodError> {
    Ok(match edn {
        Edn::Nil | Edn::Empty => PodValue::Nil,
        Edn::Bool(b) => PodValue::Bool(b),
        Edn::Int(i) => PodValue::Int(i),
        Edn::UInt(u) => PodValue::Int(u as i64),
        Edn::Double(d) => PodValue::Float(d.to_float()),
        Edn::Rational(r) => PodValue::Str(r),
        Edn::Char(c) => PodValue::Str(c.to_string()),
        Edn::Str(s) => PodValue::Str(s),
        Edn::Key(k) => PodValue::Keyword(ident_from_token(&k)),
        Edn::Symbol(s) => {
            if let Some(reader) = readers.get(&s) {
                return reader(PodValue::Symbol(ident_from_token(&s)));
            }
            PodValue::Symbol(ident_from_token(&s))
        }
        Edn::Vector(v) => {
            let mut items = Vec::new();
            for item in v.iter() {
                items.push(edn_to_pod(item.clone(), readers)?);
            }
            PodValue::Seq(items)
        }
        Edn::List(l) => {
            let mut items = Vec::new();
            for item in l.iter() {
                items.push(edn_to_pod(item.clone(), readers)?);
            }
            PodValue::Seq(items)
        }
        Edn::Set(set) => {
            let mut items = Vec::new();
            for item in set.iter() {
                items.push(edn_to_pod(item.clone(), readers)?);
            }
            PodValue::Seq(items)
        }
        Edn::Map(map) => {
            let mut pairs = Vec::new();
            for (k, v) in map.iter() {
                let key = if let Some(kw) = k.strip_prefix(':') {
                    PodValue::Keyword(ident_from_token(kw))
                } else {
                    PodValue::Str(k.clone())
                };
                pairs.push((key, edn_to_pod(v.clone(), readers)?));
            }
            PodValue::Map(pairs)
        }
    })
}

fn write_edn(value: &PodValue, out: &mut String) -> Result<(), PodError> {
    match value {
        PodValue::Nil => out.push_str("nil"),
        PodValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        PodValue::Int(i) => out.push_str(&i.to_string()),
        PodValue::Float(f) => out.push_str(&f.to_string()),
        PodValue::Str(s) => {
            out.push('"');
            for c in s.chars() {
                match c {
                    '"' => out.push_str("\\\""),
                    '\\' => out.push_str("\\\\"),
                    '\n' => out.push_str("\\n"),
                    _ => out.push(c),
                }
            }
            out.push('"');
        }
        PodValue::Keyword(ident) => {
            out.push(':');
            out.push_str(&ident.to_string());
        }
        PodValue::Symbol(ident) => out.push_str(&ident.to_string()),
        PodValue::Seq(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_edn(item, out)?;
            }
            out.push(']');
        }
        PodValue::Map(pairs) => {
            out.push('{');
            for (i, (k, v)) in pairs.iter().enumerate() {
                if i > 0 {
                    out.push(' ');
                }
                write_edn(k, out)?;
                out.push(' ');
                write_edn(v, out)?;
            }
            out.push('}');
        }
    }
    Ok(())
}
