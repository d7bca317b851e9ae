// SPDX-License-Identifier: MIT OR Apache-2.0
//! Transport: launch the child and expose a paired read/write stream,
//! either over its stdio pipes or an auxiliary TCP socket.

use std::collections::BTreeMap;
use std::path::Path;
use std::pin::Pin;
use std::process::Stdio as StdStdio;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader, ReadBuf};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::error::PodError;
use crate::spec::TransportKind;

const POD_ENV: &str = "BABASHKA_POD";
const TRANSPORT_ENV: &str = "BABASHKA_POD_TRANSPORT";
const INITIAL_BACKOFF: Duration = Duration::from_millis(10);
const MAX_BACKOFF: Duration = Duration::from_millis(320);

/// The read half of a pod's transport, independent of stdio vs. socket.
pub enum ReadHalf {
    /// Buffered read side of the child's stdout.
    Stdio(BufReader<ChildStdout>),
    /// Read side of the auxiliary TCP connection.
    Socket(tokio::io::ReadHalf<TcpStream>),
}

/// The write half of a pod's transport, independent of stdio vs. socket.
pub enum WriteHalf {
    /// Write side of the child's stdin.
    Stdio(ChildStdin),
    /// Write side of the auxiliary TCP connection.
    Socket(tokio::io::WriteHalf<TcpStream>),
}

impl AsyncRead for ReadHalf {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            ReadHalf::Stdio(r) => Pin::new(r).poll_read(cx, buf),
            ReadHalf::Socket(r) => Pin::new(r).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for WriteHalf {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            WriteHalf::Stdio(w) => Pin::new(w).poll_write(cx, buf),
            WriteHalf::Socket(w) => Pin::new(w).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            WriteHalf::Stdio(w) => Pin::new(w).poll_flush(cx),
            WriteHalf::Socket(w) => Pin::new(w).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            WriteHalf::Stdio(w) => Pin::new(w).poll_shutdown(cx),
            WriteHalf::Socket(w) => Pin::new(w).poll_shutdown(cx),
        }
    }
}

/// A spawned pod process with its paired read/write transport streams.
pub struct PodTransport {
    /// The child process; kept so `destroy` can terminate it.
    pub child: Child,
    /// Read side of the transport. `None` once taken by the processor.
    pub reader: Option<ReadHalf>,
    /// Write side of the transport. `None` once taken by the writer.
    pub writer: Option<WriteHalf>,
}

impl PodTransport {
    /// Launch `argv[0]` with `argv[1..]`, wiring up stdio or a socket
    /// per `kind`, and return the paired streams.
    pub async fn launch(
        argv: &[String],
        kind: TransportKind,
        env: &BTreeMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<Self, PodError> {
        match kind {
            TransportKind::Stdio => Self::launch_stdio(argv, env, cwd).await,
            TransportKind::Socket => Self::launch_socket(argv, env, cwd).await,
        }
    }

    async fn launch_stdio(
        argv: &[String],
        env: &BTreeMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<Self, PodError> {
        let mut cmd = build_command(argv, env, cwd)?;
        cmd.env(POD_ENV, "true")
            .stdin(StdStdio::piped())
            .stdout(StdStdio::piped())
            .stderr(StdStdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| PodError::Handshake(format!("failed to spawn pod: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| PodError::Handshake("pod stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PodError::Handshake("pod stdout unavailable".into()))?;

        Ok(Self {
            child,
            reader: Some(ReadHalf::Stdio(BufReader::new(stdout))),
            writer: Some(WriteHalf::Stdio(stdin)),
        })
    }

    async fn launch_socket(
        argv: &[String],
        env: &BTreeMap<String, String>,
        cwd: Option<&str>,
    ) -> Result<Self, PodError> {
        let mut cmd = build_command(argv, env, cwd)?;
        cmd.env(POD_ENV, "true")
            .env(TRANSPORT_ENV, "socket")
            .stdin(StdStdio::inherit())
            .stdout(StdStdio::inherit())
            .stderr(StdStdio::inherit());

        let mut child = cmd
            .spawn()
            .map_err(|e| PodError::Handshake(format!("failed to spawn pod: {e}")))?;

        let pid = child
            .id()
            .ok_or_else(|| PodError::Handshake("pod exited before reporting a pid".into()))?;
        let port_file =
            std::env::current_dir().unwrap_or_default().join(format!(".babashka-pod-{pid}.port"));

        let port = match poll_port_file(&port_file, &mut child).await {
            Ok(port) => port,
            Err(e) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(e);
            }
        };

        let stream = match connect_with_retry(port, &mut child).await {
            Ok(stream) => stream,
            Err(e) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(e);
            }
        };
        stream
            .set_nodelay(true)
            .map_err(|e| PodError::Handshake(format!("failed to set TCP_NODELAY: {e}")))?;

        let (read_half, write_half) = tokio::io::split(stream);
        Ok(Self {
            child,
            reader: Some(ReadHalf::Socket(read_half)),
            writer: Some(WriteHalf::Socket(write_half)),
        })
    }

    /// Kill the pod process and wait for it to exit.
    pub async fn kill(&mut self) {
        let _ = self.child.start_kill();
        let _ = self.child.wait().await;
    }
}

fn build_command(
    argv: &[String],
    env: &BTreeMap<String, String>,
    cwd: Option<&str>,
) -> Result<Command, PodError> {
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| PodError::Handshake("pod command must not be empty".into()))?;
    let mut cmd = Command::new(program);
    cmd.args(args);
    for (k, v) in env {
        cmd.env(k, v);
    }
    if let Some(cwd) = cwd {
        cmd.current_dir(cwd);
    }
    Ok(cmd)
}

async fn poll_port_file(path: &Path, child: &mut Child) -> Result<u16, PodError> {
    let mut delay = INITIAL_BACKOFF;
    loop {
        if let Ok(contents) = tokio::fs::read_to_string(path).await
            && let Ok(port) = contents.trim().parse::<u16>()
        {
            return Ok(port);
        }
        if let Some(status) = child.try_wait().map_err(PodError::from)? {
            return Err(PodError::Handshake(format!(
                "pod exited before writing its port file (status={status:?})"
            )));
        }
        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(MAX_BACKOFF);
    }
}

async fn connect_with_retry(port: u16, child: &mut Child) -> Result<TcpStream, PodError> {
    let mut delay = INITIAL_BACKOFF;
    loop {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(stream) => return Ok(stream),
            Err(_) => {
                if let Some(status) = child.try_wait().map_err(PodError::from)? {
                    return Err(PodError::Handshake(format!(
                        "pod exited before accepting a connection (status={status:?})"
                    )));
                }
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(MAX_BACKOFF);
            }
        }
    }
}
