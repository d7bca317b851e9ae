// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pod lifecycle: launch, handshake, invoke, load-ns, and destroy.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::debug;
use uuid::Uuid;

use crate::bencode::{BValue, Envelope, encode_envelope, get_list, get_maybe_string};
use crate::codec::{self, PayloadCodec, PayloadFormat, TagReader};
use crate::error::PodError;
use crate::namespace::Namespace;
use crate::process_registry;
use crate::processor;
use crate::registry::{CallRegistry, Waiter};
use crate::resolver::PodResolver;
use crate::spec::{LoadOptions, PodSpec, TransportKind};
use crate::transport::{PodTransport, WriteHalf};
use crate::value::PodValue;

/// Options governing one `invoke_var` call.
#[derive(Debug, Clone, Copy, Default)]
pub struct InvokeOptions {
    /// Register a streaming waiter instead of a one-shot future, for
    /// vars that may reply with more than one value before `done`.
    pub streaming: bool,
    /// Ask the pod to attach argument metadata to the invocation.
    pub arg_meta: bool,
}

/// A running pod subprocess: its negotiated codec, advertised
/// namespaces, and in-flight call registry.
pub struct Pod {
    /// The pod's id, taken from its first advertised namespace, or a
    /// generated id if it advertised none.
    pub pod_id: String,
    /// The argv used to launch the pod.
    pub command: Vec<String>,
    /// The transport the pod was launched with.
    pub transport_kind: TransportKind,
    /// Ops the pod's describe reply advertised (`"invoke"`, `"load-ns"`,
    /// `"shutdown"`, ...).
    pub ops: HashSet<String>,
    pub(crate) codec: Box<dyn PayloadCodec>,
    pub(crate) namespaces: RwLock<Vec<Namespace>>,
    pub(crate) registry: CallRegistry,
    writer: Mutex<WriteHalf>,
    pub(crate) out_sink: Mutex<Box<dyn AsyncWrite + Unpin + Send>>,
    pub(crate) err_sink: Mutex<Box<dyn AsyncWrite + Unpin + Send>>,
    process: Mutex<PodTransport>,
    processor_handle: Mutex<Option<JoinHandle<()>>>,
    remove_ns: Option<Arc<dyn Fn(&str) + Send + Sync>>,
    destroyed: AtomicBool,
}

/// Launch and handshake with a pod, returning a handle that stays
/// valid until [`Pod::destroy`] is called.
pub async fn load_pod(
    spec: PodSpec,
    opts: LoadOptions,
    resolver: Option<&dyn PodResolver>,
) -> Result<Arc<Pod>, PodError> {
    let argv = resolve_argv(&spec, &opts, resolver)?;

    if opts.download_only {
        // Resolution (and any caching it performs as a side effect) is
        // done; there is no process to hand back.
        return Err(PodError::Resolver(
            "download_only requests only resolve and cache a pod; it never launches one".into(),
        ));
    }

    let mut transport =
        PodTransport::launch(&argv, opts.transport, &opts.env, opts.cwd.as_deref()).await?;
    let mut writer = transport
        .writer
        .take()
        .ok_or_else(|| PodError::Handshake("transport produced no writer".into()))?;
    let mut reader = transport
        .reader
        .take()
        .ok_or_else(|| PodError::Handshake("transport produced no reader".into()))?;

    let mut buf = Vec::new();
    let describe_reply = match opts.metadata.clone() {
        Some(envelope) => envelope,
        None => match handshake(&mut writer, &mut reader, &mut buf).await {
            Ok(envelope) => envelope,
            Err(e) => {
                transport.kill().await;
                return Err(e);
            }
        },
    };

    match assemble_pod(describe_reply, &opts, argv, transport, writer, reader, buf).await {
        Ok(pod) => {
            process_registry::register(pod.clone());
            debug!(target: "pod_client.pod", pod_id = %pod.pod_id, "pod loaded");
            Ok(pod)
        }
        Err(e) => Err(e),
    }
}

async fn assemble_pod(
    describe_reply: Envelope,
    opts: &LoadOptions,
    argv: Vec<String>,
    mut transport: PodTransport,
    writer: WriteHalf,
    reader: crate::transport::ReadHalf,
    buf: Vec<u8>,
) -> Result<Arc<Pod>, PodError> {
    let format = PayloadFormat::parse(get_maybe_string(&describe_reply, "format").as_deref());
    let readers = resolve_readers(&describe_reply, opts);
    let codec = match codec::codec_for(format, readers) {
        Ok(codec) => codec,
        Err(e) => {
            transport.kill().await;
            return Err(e);
        }
    };

    let ops: HashSet<String> = get_list(&describe_reply, "ops")
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

    let mut namespaces = Vec::new();
    if let Some(list) = get_list(&describe_reply, "namespaces") {
        for item in list {
            let BValue::Dict(dict) = item else { continue };
            let ns = match Namespace::from_envelope(dict, codec.as_ref()) {
                Ok(ns) => ns,
                Err(e) => {
                    transport.kill().await;
                    return Err(e);
                }
            };
            if namespaces.iter().any(|n: &Namespace| n.name == ns.name) {
                transport.kill().await;
                return Err(PodError::Handshake(format!(
                    "pod advertised namespace `{}` twice",
                    ns.name
                )));
            }
            namespaces.push(ns);
        }
    }

    let pod_id = namespaces
        .first()
        .map(|ns| ns.name.clone())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let pod = Arc::new(Pod {
        pod_id,
        command: argv,
        transport_kind: opts.transport,
        ops,
        codec,
        namespaces: RwLock::new(namespaces),
        registry: CallRegistry::new(),
        writer: Mutex::new(writer),
        out_sink: Mutex::new(Box::new(tokio::io::stdout())),
        err_sink: Mutex::new(Box::new(tokio::io::stderr())),
        process: Mutex::new(transport),
        processor_handle: Mutex::new(None),
        remove_ns: opts.remove_ns.clone(),
        destroyed: AtomicBool::new(false),
    });

    let handle = processor::spawn(pod.clone(), reader, buf);
    *pod.processor_handle.lock().await = Some(handle);

    Ok(pod)
}

fn resolve_argv(
    spec: &PodSpec,
    opts: &LoadOptions,
    resolver: Option<&dyn PodResolver>,
) -> Result<Vec<String>, PodError> {
    if let Some(path) = &opts.path {
        return Ok(vec![path.clone()]);
    }
    match spec {
        PodSpec::Argv(argv) => Ok(argv.clone()),
        PodSpec::Coordinate { pod_id, version } => {
            let version = opts.version.clone().or_else(|| version.clone());
            let resolver = resolver.ok_or_else(|| {
                PodError::Resolver(format!(
                    "pod coordinate `{pod_id}` requires a resolver but none was supplied"
                ))
            })?;
            resolver.resolve(pod_id, version.as_deref(), opts.force)
        }
    }
}

fn resolve_readers(describe_reply: &Envelope, opts: &LoadOptions) -> BTreeMap<String, TagReader> {
    let Some(resolve) = &opts.resolve else {
        return BTreeMap::new();
    };
    let mut readers = BTreeMap::new();
    if let Some(BValue::Dict(tags)) = describe_reply.get("readers") {
        for tag in tags.keys() {
            if let Some(reader) = resolve(tag) {
                readers.insert(tag.clone(), reader);
            }
        }
    }
    readers
}

async fn handshake(
    writer: &mut WriteHalf,
    reader: &mut crate::transport::ReadHalf,
    buf: &mut Vec<u8>,
) -> Result<Envelope, PodError> {
    let mut request = Envelope::new();
    request.insert("op".into(), BValue::text("describe"));
    request.insert("id".into(), BValue::text(Uuid::new_v4().to_string()));
    let bytes = encode_envelope(&request)?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| PodError::Handshake(format!("failed to write describe: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| PodError::Handshake(format!("failed to flush describe: {e}")))?;
    processor::read_one_envelope(reader, buf).await
}

impl Pod {
    /// `true` once [`Self::destroy`] has started tearing the pod down;
    /// the processor loop uses this to distinguish a clean shutdown
    /// from an unexpected exit.
    pub fn is_destroying(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }

    /// A snapshot of the pod's current namespaces, including any
    /// resolved since load via `load_ns`.
    pub async fn namespaces(&self) -> Vec<Namespace> {
        self.namespaces.read().await.clone()
    }

    async fn write_envelope(&self, envelope: &Envelope) -> Result<(), PodError> {
        let bytes = encode_envelope(envelope)?;
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Invoke `qualified_name` ("ns/name") with `args`, returning a
    /// waiter for its reply. The waiter is registered before the
    /// request is written, so a reply can never race ahead of its slot.
    pub async fn invoke_var(
        self: &Arc<Self>,
        qualified_name: &str,
        args: Vec<PodValue>,
        opts: InvokeOptions,
    ) -> Result<Waiter, PodError> {
        let args_str = self.codec.write(&PodValue::Seq(args))?;
        let (id, waiter) = if opts.streaming {
            self.registry.register_streaming()
        } else {
            self.registry.register_oneshot()
        };

        let mut envelope = Envelope::new();
        envelope.insert("op".into(), BValue::text("invoke"));
        envelope.insert("id".into(), BValue::text(id.clone()));
        envelope.insert("var".into(), BValue::text(qualified_name));
        envelope.insert("args".into(), BValue::text(args_str));
        if opts.arg_meta {
            envelope.insert("arg-meta".into(), BValue::boolean(true));
        }

        if let Err(e) = self.write_envelope(&envelope).await {
            self.registry.discard(&id);
            return Err(e);
        }
        Ok(waiter)
    }

    /// Resolve a deferred namespace's vars via the pod's `load-ns` op,
    /// returning the namespace once the pod has replied.
    pub async fn load_ns(self: &Arc<Self>, ns_name: &str) -> Result<Namespace, PodError> {
        if !self.ops.contains("load-ns") {
            return Err(PodError::Codec("pod does not advertise load-ns".into()));
        }

        let (id, waiter) = self.registry.register_oneshot();
        let mut envelope = Envelope::new();
        envelope.insert("op".into(), BValue::text("load-ns"));
        envelope.insert("id".into(), BValue::text(id.clone()));
        envelope.insert("ns".into(), BValue::text(ns_name));

        if let Err(e) = self.write_envelope(&envelope).await {
            self.registry.discard(&id);
            return Err(e);
        }

        let Waiter::OneShot(rx) = waiter else {
            unreachable!("register_oneshot always returns a OneShot waiter")
        };
        rx.await.map_err(|_| PodError::PodTerminated)??;

        self.namespaces
            .read()
            .await
            .iter()
            .find(|ns| ns.name == ns_name)
            .cloned()
            .ok_or_else(|| PodError::Codec(format!("pod did not return namespace `{ns_name}`")))
    }

    /// Tear the pod down: request a graceful `shutdown` if advertised
    /// (waiting up to five seconds for the process to exit on its own),
    /// otherwise kill it outright. Fails every outstanding waiter and
    /// is idempotent.
    pub async fn destroy(self: &Arc<Self>) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }

        if self.ops.contains("shutdown") {
            let mut envelope = Envelope::new();
            envelope.insert("op".into(), BValue::text("shutdown"));
            envelope.insert("id".into(), BValue::text(Uuid::new_v4().to_string()));
            let _ = self.write_envelope(&envelope).await;

            let mut process = self.process.lock().await;
            if tokio::time::timeout(Duration::from_secs(5), process.child.wait())
                .await
                .is_err()
            {
                process.kill().await;
            }
        } else {
            self.process.lock().await.kill().await;
        }

        if let Some(handle) = self.processor_handle.lock().await.take() {
            handle.abort();
        }

        self.registry.fail_all(|| PodError::PodTerminated);

        if let Some(hook) = &self.remove_ns {
            for ns in self.namespaces.read().await.iter() {
                hook(&ns.name);
            }
        }

        process_registry::unregister(&self.pod_id);
        debug!(target: "pod_client.pod", pod_id = %self.pod_id, "pod destroyed");
    }
}
