//! Loko MCP — the LLM tool protocol over stdio
//!
//! JSON-RPC request/response, one message per line. The protocol stream
//! owns stdout; anything informational goes to stderr through tracing.

pub mod protocol;
pub mod tools;

use std::path::PathBuf;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

use protocol::{Request, Response, RpcError};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// The stdio tool server for one project root.
pub struct McpServer {
    root: PathBuf,
}

impl McpServer {
    pub fn new(root: PathBuf) -> Self {
        McpServer { root }
    }

    /// Serve JSON-RPC over stdin/stdout until EOF or cancellation.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let stdin = BufReader::new(tokio::io::stdin());
        let mut stdout = tokio::io::stdout();
        let mut lines = stdin.lines();

        tracing::info!(root = %self.root.display(), "MCP server ready");
        loop {
            let line = tokio::select! {
                _ = cancel.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(&line).await {
                let mut payload = serde_json::to_string(&response)?;
                payload.push('\n');
                stdout.write_all(payload.as_bytes()).await?;
                stdout.flush().await?;
            }
        }
        tracing::info!("MCP server stopped");
        Ok(())
    }

    /// Handle one raw message; notifications produce no response.
    pub async fn handle_line(&self, line: &str) -> Option<Response> {
        let request: Request = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(err) => {
                tracing::warn!(error = %err, "unparseable request");
                return Some(Response::error(
                    serde_json::Value::Null,
                    RpcError::parse_error(err.to_string()),
                ));
            }
        };
        let id = request.id.clone();
        match (id, self.dispatch(request).await) {
            (Some(id), Ok(result)) => Some(Response::result(id, result)),
            (Some(id), Err(err)) => Some(Response::error(id, err)),
            // A notification: nothing goes back on the wire.
            (None, _) => None,
        }
    }

    async fn dispatch(&self, request: Request) -> Result<serde_json::Value, RpcError> {
        match request.method.as_str() {
            "initialize" => Ok(serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "serverInfo": {
                    "name": "loko",
                    "version": env!("CARGO_PKG_VERSION"),
                },
                "capabilities": { "tools": {} },
            })),
            "ping" => Ok(serde_json::json!({})),
            "tools/list" => Ok(serde_json::json!({ "tools": tools::list() })),
            "tools/call" => {
                let params = request.params.unwrap_or_default();
                let name = params
                    .get("name")
                    .and_then(|n| n.as_str())
                    .ok_or_else(|| RpcError::invalid_params("missing tool name"))?;
                let arguments = params.get("arguments").cloned().unwrap_or(serde_json::json!({}));
                match tools::call(&self.root, name, arguments).await {
                    Ok(value) => Ok(serde_json::json!({
                        "content": [{ "type": "text", "text": value.to_string() }],
                    })),
                    Err(err) => Ok(serde_json::json!({
                        "content": [{ "type": "text", "text": err.to_string() }],
                        "isError": true,
                    })),
                }
            }
            method if method.starts_with("notifications/") => Ok(serde_json::Value::Null),
            other => Err(RpcError::method_not_found(other)),
        }
    }
}
