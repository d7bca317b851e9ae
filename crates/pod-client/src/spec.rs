// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pod coordinates, transport selection, and `load_pod` options.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bencode::Envelope;
use crate::codec::TagReader;

/// How to locate the pod's executable.
#[derive(Debug, Clone)]
pub enum PodSpec {
    /// A literal argv (or a single path/command with no arguments),
    /// used as-is without consulting a resolver.
    Argv(Vec<String>),
    /// A pod coordinate (`pod/id`, optionally pinned to a version),
    /// resolved via the caller-supplied [`crate::resolver::PodResolver`].
    Coordinate {
        /// The pod id, e.g. `"org/my-pod"`.
        pod_id: String,
        /// Optional pinned version.
        version: Option<String>,
    },
}

impl PodSpec {
    /// A literal argv.
    pub fn argv(args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        PodSpec::Argv(args.into_iter().map(Into::into).collect())
    }

    /// A pod coordinate, optionally pinned to a version.
    pub fn coordinate(pod_id: impl Into<String>, version: Option<String>) -> Self {
        PodSpec::Coordinate {
            pod_id: pod_id.into(),
            version,
        }
    }
}

/// Transport selection for [`crate::pod::load_pod`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    /// The child's stdin/stdout pipes carry the protocol.
    #[default]
    Stdio,
    /// An auxiliary TCP socket carries the protocol; stdio is inherited.
    Socket,
}

/// Options recognized by [`crate::pod::load_pod`].
#[derive(Clone, Default)]
pub struct LoadOptions {
    /// Transport to use.
    pub transport: TransportKind,
    /// Version override, when `spec` is a literal argv/path that the
    /// resolver should still pin.
    pub version: Option<String>,
    /// Explicit executable path, bypassing the resolver entirely.
    pub path: Option<String>,
    /// Force re-resolution/re-download even if a cached pod is available.
    pub force: bool,
    /// A pre-captured describe reply; when present, the handshake is
    /// skipped and this envelope is used instead.
    pub metadata: Option<Envelope>,
    /// Hook invoked with each namespace name as it is retracted on destroy.
    pub remove_ns: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    /// Tag-symbol → reader-function resolver, applied to each tag in
    /// the describe reply's `readers` map.
    pub resolve: Option<Arc<dyn Fn(&str) -> Option<TagReader> + Send + Sync>>,
    /// Resolve (and cache) the pod without launching it.
    pub download_only: bool,
    /// Additional environment variables for the child process.
    pub env: BTreeMap<String, String>,
    /// Working directory override for the child process.
    pub cwd: Option<String>,
}

impl LoadOptions {
    /// Select the transport.
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Pin a version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Bypass the resolver with an explicit path.
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Skip the handshake using a pre-captured describe reply.
    pub fn with_metadata(mut self, metadata: Envelope) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Register a namespace-retraction hook.
    pub fn with_remove_ns(mut self, hook: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.remove_ns = Some(Arc::new(hook));
        self
    }

    /// Register an EDN tag-reader resolver.
    pub fn with_resolve(
        mut self,
        resolve: impl Fn(&str) -> Option<TagReader> + Send + Sync + 'static,
    ) -> Self {
        self.resolve = Some(Arc::new(resolve));
        self
    }

    /// Resolve (and cache) without launching.
    pub fn download_only(mut self) -> Self {
        self.download_only = true;
        self
    }

    /// Force re-resolution even if cached.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    /// Add an environment variable for the child process.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Override the child process's working directory.
    pub fn with_cwd(mut self, cwd: impl Into<String>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }
}
