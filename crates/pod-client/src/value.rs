// SPDX-License-Identifier: MIT OR Apache-2.0
//! Codec-agnostic value domain carried by `args`, `value`, `ex-data`, and var `meta`.
//!
//! Unlike a single-codec transport (which can use `serde_json::Value`
//! directly), a pod's payload format is chosen at runtime between EDN,
//! JSON, and Transit+JSON, so reads and writes go through this shared
//! domain instead of any one wire representation.

use std::fmt;

/// A (possibly namespace-qualified) symbol or keyword.
///
/// EDN namespaced symbols/keywords (`:ns/name`, `ns/name`) keep their
/// qualifier here rather than collapsing to the plain name; callers
/// that only want the plain name use [`Ident::name`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident {
    /// Namespace qualifier, if any (the part before `/`).
    pub namespace: Option<String>,
    /// Plain name (the part after `/`, or the whole token if unqualified).
    pub name: String,
}

impl Ident {
    /// An unqualified identifier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// A namespace-qualified identifier.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Parse `ns/name` or a bare `name` into an [`Ident`].
    pub fn parse(token: &str) -> Self {
        match token.split_once('/') {
            Some((ns, name)) if !ns.is_empty() => Self::namespaced(ns, name),
            _ => Self::new(token),
        }
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{ns}/{}", self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A value in the shared pod payload domain.
///
/// Associative literals (ordered or unordered) and sequential literals
/// (vector or list) each collapse to one shape here — [`PodValue::Map`]
/// and [`PodValue::Seq`] respectively — matching the EDN read-side
/// collapsing rule; the distinction, where a codec's source format
/// drew one, is not preserved.
#[derive(Debug, Clone, PartialEq)]
pub enum PodValue {
    /// `nil` / `null`.
    Nil,
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Str(String),
    /// An EDN keyword (`:foo`, `:ns/foo`). JSON/Transit+JSON never
    /// produce this variant on read, but it is still a legal value to
    /// write across codecs that degrade it to a string.
    Keyword(Ident),
    /// An EDN symbol (`foo`, `ns/foo`).
    Symbol(Ident),
    /// An ordered sequence (EDN vector or list).
    Seq(Vec<PodValue>),
    /// An associative collection, as ordered key/value pairs.
    Map(Vec<(PodValue, PodValue)>),
}

impl PodValue {
    /// Build a map from borrowed pairs.
    pub fn map(pairs: impl IntoIterator<Item = (PodValue, PodValue)>) -> Self {
        PodValue::Map(pairs.into_iter().collect())
    }

    /// Look up a value in a [`PodValue::Map`] by a plain string key,
    /// matching either a [`PodValue::Str`] or a [`PodValue::Keyword`]
    /// whose plain name equals `key`.
    pub fn get(&self, key: &str) -> Option<&PodValue> {
        match self {
            PodValue::Map(pairs) => pairs.iter().find_map(|(k, v)| {
                let matches = match k {
                    PodValue::Str(s) => s == key,
                    PodValue::Keyword(ident) => ident.name == key && ident.namespace.is_none(),
                    _ => false,
                };
                matches.then_some(v)
            }),
            _ => None,
        }
    }

    /// Borrow as a string, if this is a [`PodValue::Str`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PodValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow as a sequence, if this is a [`PodValue::Seq`].
    pub fn as_seq(&self) -> Option<&[PodValue]> {
        match self {
            PodValue::Seq(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow as an integer, if this is a [`PodValue::Int`].
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PodValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for PodValue {
    fn from(s: &str) -> Self {
        PodValue::Str(s.to_string())
    }
}

impl From<String> for PodValue {
    fn from(s: String) -> Self {
        PodValue::Str(s)
    }
}

impl From<i64> for PodValue {
    fn from(i: i64) -> Self {
        PodValue::Int(i)
    }
}

impl From<bool> for PodValue {
    fn from(b: bool) -> Self {
        PodValue::Bool(b)
    }
}

impl From<Vec<PodValue>> for PodValue {
    fn from(items: Vec<PodValue>) -> Self {
        PodValue::Seq(items)
    }
}
