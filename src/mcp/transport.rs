//! MCP transport layer.
//!
//! Every transport frames one JSON-RPC envelope per line. [`LineTransport`]
//! does the framing over any async byte stream; [`StdioTransport`] runs it
//! over the pipes of a spawned server process.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, DuplexStream, ReadHalf,
    WriteHalf,
};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, trace, warn};

use super::envelope::{JsonRpcErrorObject, JsonRpcMessage};
use crate::error::{BridgeError, Result};

/// How long a child process gets to exit after its stdin closes.
const CHILD_EXIT_GRACE: Duration = Duration::from_secs(2);

/// Transport trait for MCP communication.
#[async_trait]
pub trait MCPTransport: Send {
    /// Send one envelope.
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<()>;

    /// Receive the next envelope, or `None` once the peer has closed.
    ///
    /// A line that is not a valid envelope yields
    /// [`BridgeError::Protocol`] with the parse-error code; the transport
    /// stays usable afterwards.
    async fn receive(&mut self) -> Result<Option<JsonRpcMessage>>;

    /// Close the transport. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;
}

/// Newline-delimited JSON-RPC over an async reader/writer pair.
///
/// Lines are read as raw bytes, so invalid UTF-8 is just another malformed
/// envelope. A partly read line survives a cancelled `receive`.
pub struct LineTransport<R, W> {
    reader: BufReader<R>,
    pending: Vec<u8>,
    writer: W,
    closed: bool,
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            pending: Vec::new(),
            writer,
            closed: false,
        }
    }
}

#[async_trait]
impl<R, W> MCPTransport for LineTransport<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<()> {
        if self.closed {
            return Err(BridgeError::transport("transport is closed"));
        }
        let mut line = serde_json::to_string(message)?;
        trace!(%line, "send");
        line.push('\n');
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn receive(&mut self) -> Result<Option<JsonRpcMessage>> {
        if self.closed {
            return Ok(None);
        }
        loop {
            let read = self.reader.read_until(b'\n', &mut self.pending).await?;
            if read == 0 && self.pending.is_empty() {
                return Ok(None);
            }
            let frame = std::mem::take(&mut self.pending);
            let line = frame.trim_ascii();
            if line.is_empty() {
                continue;
            }
            trace!(line = %String::from_utf8_lossy(line), "receive");
            return serde_json::from_slice(line)
                .map(Some)
                .map_err(|e| BridgeError::Protocol {
                    code: JsonRpcErrorObject::PARSE_ERROR,
                    message: format!("malformed envelope: {e}"),
                });
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// One end of an in-process transport pair.
pub type MemoryTransport = LineTransport<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

/// Two connected in-process transports. What one sends, the other receives.
pub fn memory_pair() -> (MemoryTransport, MemoryTransport) {
    let (a, b) = tokio::io::duplex(64 * 1024);
    let (a_read, a_write) = tokio::io::split(a);
    let (b_read, b_write) = tokio::io::split(b);
    (
        LineTransport::new(a_read, a_write),
        LineTransport::new(b_read, b_write),
    )
}

/// Command line that launches a tool server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTarget {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ServerTarget {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Launch a server script with the interpreter its extension implies.
    ///
    /// `.js` scripts run under `node`, `.py` under `python3` (`python` on
    /// Windows). Anything else is rejected.
    pub fn from_script(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let interpreter = match path.extension().and_then(|e| e.to_str()) {
            Some("js") => "node",
            Some("py") if cfg!(windows) => "python",
            Some("py") => "python3",
            _ => {
                return Err(BridgeError::Configuration(format!(
                    "server script must be a .js or .py file: {}",
                    path.display()
                )))
            }
        };
        Ok(Self::new(interpreter, vec![path.display().to_string()]))
    }

    /// Short human-readable label for logs.
    pub fn label(&self) -> String {
        match self.args.last() {
            Some(last) => format!("{} {}", self.command, last),
            None => self.command.clone(),
        }
    }
}

/// Stdio-based MCP transport (for local MCP servers).
///
/// The child is killed if the transport is dropped without being closed.
pub struct StdioTransport {
    target: ServerTarget,
    child: Option<Child>,
    io: LineTransport<ChildStdout, ChildStdin>,
    closed: bool,
}

impl StdioTransport {
    /// Spawn the server process. Fails immediately if it cannot start.
    pub fn spawn(target: &ServerTarget) -> Result<Self> {
        if target.command.trim().is_empty() {
            return Err(BridgeError::Configuration("server command is empty".into()));
        }
        let mut child = Command::new(&target.command)
            .args(&target.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BridgeError::transport(format!("failed to start '{}': {e}", target.label()))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BridgeError::transport("child stdin was not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BridgeError::transport("child stdout was not captured"))?;

        debug!(server = %target.label(), pid = ?child.id(), "spawned tool server");
        Ok(Self {
            target: target.clone(),
            child: Some(child),
            io: LineTransport::new(stdout, stdin),
            closed: false,
        })
    }

    pub fn target(&self) -> &ServerTarget {
        &self.target
    }
}

#[async_trait]
impl MCPTransport for StdioTransport {
    async fn send(&mut self, message: &JsonRpcMessage) -> Result<()> {
        self.io.send(message).await
    }

    async fn receive(&mut self) -> Result<Option<JsonRpcMessage>> {
        self.io.receive().await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.io.close().await {
            debug!(error = %e, "closing server stdin failed");
        }

        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        match tokio::time::timeout(CHILD_EXIT_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(server = %self.target.label(), %status, "tool server exited"),
            Ok(Err(e)) => warn!(server = %self.target.label(), error = %e, "waiting for tool server failed"),
            Err(_) => {
                warn!(server = %self.target.label(), "tool server did not exit, killing it");
                child.kill().await?;
            }
        }
        Ok(())
    }
}
