// SPDX-License-Identifier: MIT OR Apache-2.0
//! Namespace/var binding: materializing a pod's advertised vars into
//! locally invocable handles.

use std::collections::BTreeMap;

use crate::bencode::{BValue, Envelope, get_bool, get_list, get_maybe_string, get_string};
use crate::codec::PayloadCodec;
use crate::error::PodError;
use crate::value::PodValue;

/// Either an opaque inline-code body (for the binding surface to
/// evaluate host-locally) or an invocable handle.
#[derive(Debug, Clone)]
pub enum VarBody {
    /// Host-language source, interpreted by a host-language evaluator.
    /// Never dispatched through the wire protocol.
    InlineCode(String),
    /// No inline code: invoke through `invoke_var` using this var's
    /// qualified name.
    Invoker,
}

/// A single invocable function (or inline code snippet) advertised by a namespace.
#[derive(Debug, Clone)]
pub struct Var {
    /// Var name, usually kebab-cased, preserved verbatim.
    pub name: String,
    /// Whether invocations of this var may stream multiple values before `done`.
    pub is_async: bool,
    /// Whether invocations should carry argument metadata.
    pub arg_meta: bool,
    /// Decoded `meta`, if the describe reply carried one.
    pub meta: Option<PodValue>,
    /// Inline code, or an invoker marker.
    pub body: VarBody,
}

impl Var {
    /// The `"<ns>/<name>"` form used on the wire and as a registry key.
    pub fn qualified_name(&self, namespace: &str) -> String {
        format!("{namespace}/{}", self.name)
    }

    /// `true` unless this var carries inline code instead of an invoker.
    pub fn is_invocable(&self) -> bool {
        matches!(self.body, VarBody::Invoker)
    }

    /// Parse one var descriptor `{name, async?, code?, meta?, arg-meta?}`.
    pub fn from_envelope(dict: &Envelope, codec: &dyn PayloadCodec) -> Result<Self, PodError> {
        let name = get_string(dict, "name")?;
        let is_async = get_bool(dict, "async");
        let arg_meta = get_bool(dict, "arg-meta");
        let meta = get_maybe_string(dict, "meta")
            .map(|s| codec.read(&s))
            .transpose()?;
        let body = match get_maybe_string(dict, "code") {
            Some(code) => VarBody::InlineCode(code),
            None => VarBody::Invoker,
        };
        Ok(Var {
            name,
            is_async,
            arg_meta,
            meta,
            body,
        })
    }
}

/// A named group of vars within one pod.
///
/// Two namespaces with the same name within one pod are forbidden; the
/// pod lifecycle layer enforces that when assembling the describe
/// reply's namespace list.
#[derive(Debug, Clone)]
pub struct Namespace {
    /// Dot-separated namespace name.
    pub name: String,
    /// Vars known for this namespace. Empty for an unresolved deferred namespace.
    pub vars: BTreeMap<String, Var>,
    /// Whether this namespace's vars load lazily via `load_ns`.
    pub deferred: bool,
}

impl Namespace {
    /// An empty namespace with the given name.
    pub fn new(name: impl Into<String>, deferred: bool) -> Self {
        Self {
            name: name.into(),
            vars: BTreeMap::new(),
            deferred,
        }
    }

    /// Parse one namespace descriptor `{name, defer?, vars[...]}`.
    pub fn from_envelope(dict: &Envelope, codec: &dyn PayloadCodec) -> Result<Self, PodError> {
        let name = get_string(dict, "name")?;
        let deferred = get_bool(dict, "defer");
        let mut vars = BTreeMap::new();
        if let Some(list) = get_list(dict, "vars") {
            for item in list {
                if let BValue::Dict(var_dict) = item {
                    let var = Var::from_envelope(var_dict, codec)?;
                    vars.insert(var.name.clone(), var);
                }
            }
        }
        Ok(Namespace {
            name,
            vars,
            deferred,
        })
    }
}
