// ABOUTME: Stdio transport: spawns the MCP server as a subprocess and multiplexes JSON-RPC by id.
// ABOUTME: A reader task routes responses to waiting callers and answers server pings.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use super::Transport;
use crate::error::ToolError;
use crate::protocol::{self, Incoming};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, ToolError>>>>>;
type SharedStdin = Arc<tokio::sync::Mutex<Option<ChildStdin>>>;

/// JSON-RPC over a child process's stdin/stdout, one message per line.
pub struct StdioTransport {
    server: String,
    stdin: SharedStdin,
    child: tokio::sync::Mutex<Option<Child>>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Removes a pending entry if the waiting request is dropped (e.g. by a timeout).
struct PendingGuard {
    pending: Pending,
    id: u64,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if let Ok(mut map) = self.pending.lock() {
            map.remove(&self.id);
        }
    }
}

impl StdioTransport {
    /// Spawn `command` with piped stdio and start the reader tasks.
    pub fn spawn(
        server: &str,
        command: &str,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> Result<Self, ToolError> {
        let mut child = Command::new(command)
            .args(args)
            .envs(env)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Spawn(format!("'{}': {}", command, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ToolError::Spawn("child stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ToolError::Spawn("child stdout unavailable".to_string()))?;
        let stderr = child.stderr.take();

        tracing::debug!(server, command, pid = ?child.id(), "spawned tool server");

        let stdin: SharedStdin = Arc::new(tokio::sync::Mutex::new(Some(stdin)));
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        let mut tasks = vec![tokio::spawn(read_loop(
            server.to_string(),
            stdout,
            Arc::clone(&stdin),
            Arc::clone(&pending),
            Arc::clone(&closed),
        ))];

        if let Some(stderr) = stderr {
            let server = server.to_string();
            tasks.push(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(server = %server, "{}", line);
                }
            }));
        }

        Ok(Self {
            server: server.to_string(),
            stdin,
            child: tokio::sync::Mutex::new(Some(child)),
            pending,
            next_id: AtomicU64::new(1),
            closed,
            tasks: Mutex::new(tasks),
        })
    }

    async fn write(&self, message: &Value) -> Result<(), ToolError> {
        write_line(&self.stdin, message).await
    }
}

async fn write_line(stdin: &SharedStdin, message: &Value) -> Result<(), ToolError> {
    let mut line = message.to_string();
    line.push('\n');
    let mut guard = stdin.lock().await;
    let stdin = guard.as_mut().ok_or(ToolError::Closed)?;
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| ToolError::Transport(format!("write to server failed: {}", e)))?;
    stdin
        .flush()
        .await
        .map_err(|e| ToolError::Transport(format!("flush to server failed: {}", e)))
}

fn fail_pending(pending: &Pending) {
    if let Ok(mut map) = pending.lock() {
        for (_, tx) in map.drain() {
            let _ = tx.send(Err(ToolError::Closed));
        }
    }
}

async fn read_loop(
    server: String,
    stdout: tokio::process::ChildStdout,
    stdin: SharedStdin,
    pending: Pending,
    closed: Arc<AtomicBool>,
) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(server = %server, error = %e, "failed reading from tool server");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(&line) else {
            tracing::debug!(server = %server, line = %line, "ignoring non-JSON output");
            continue;
        };

        match Incoming::classify(&value) {
            Some(Incoming::Response { id, result }) => {
                let tx = pending.lock().ok().and_then(|mut map| map.remove(&id));
                match tx {
                    Some(tx) => {
                        let _ = tx.send(protocol::into_result(result));
                    }
                    None => {
                        tracing::debug!(server = %server, id, "response for unknown or abandoned request");
                    }
                }
            }
            Some(Incoming::Request { id, method }) => {
                let reply = if method == "ping" {
                    json!({"jsonrpc": "2.0", "id": id, "result": {}})
                } else {
                    json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": protocol::METHOD_NOT_FOUND, "message": format!("unsupported method {}", method)}
                    })
                };
                if let Err(e) = write_line(&stdin, &reply).await {
                    tracing::debug!(server = %server, error = %e, "failed to answer server request");
                }
            }
            Some(Incoming::Notification { method }) => {
                tracing::debug!(server = %server, method = %method, "server notification");
            }
            None => {
                tracing::debug!(server = %server, "ignoring non JSON-RPC message");
            }
        }
    }

    closed.store(true, Ordering::SeqCst);
    fail_pending(&pending);
    tracing::debug!(server = %server, "tool server output closed");
}

#[async_trait]
impl Transport for StdioTransport {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ToolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ToolError::Closed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| ToolError::Transport("pending request table poisoned".to_string()))?
            .insert(id, tx);
        let _guard = PendingGuard {
            pending: Arc::clone(&self.pending),
            id,
        };

        self.write(&protocol::request(id, method, params)).await?;
        rx.await.map_err(|_| ToolError::Closed)?
    }

    async fn notify(&self, method: &str, params: Value) -> Result<(), ToolError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ToolError::Closed);
        }
        self.write(&protocol::notification(method, params)).await
    }

    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) && self.child.lock().await.is_none() {
            return;
        }

        // Dropping stdin lets well-behaved servers exit on EOF.
        self.stdin.lock().await.take();

        if let Some(mut child) = self.child.lock().await.take() {
            if let Err(e) = child.kill().await {
                tracing::debug!(server = %self.server, error = %e, "tool server already exited");
            }
        }

        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        fail_pending(&self.pending);
        tracing::info!(server = %self.server, "closed tool server");
    }
}
