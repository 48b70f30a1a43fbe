//! MCP client session — JSON-RPC 2.0 over an opaque bidirectional channel.
//!
//! Two transports: a local subprocess speaking newline-delimited JSON-RPC
//! over its stdio pipes, and a streamable HTTP endpoint that answers each
//! POST with either a plain JSON body or an SSE-framed one.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use taskloom_core::error::McpError;

/// MCP protocol revision this client speaks.
const PROTOCOL_VERSION: &str = "2024-11-05";

/// Parameters for spawning an MCP server as a local subprocess.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdioServerParams {
    /// The command to run
    pub command: String,

    /// Command arguments
    #[serde(default)]
    pub args: Vec<String>,

    /// Extra environment variables for the subprocess
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Parameters for reaching an MCP server over streamable HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamableHttpParams {
    /// The endpoint URL
    pub url: String,

    /// Headers included with every request (e.g. an Authorization bearer)
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// A tool descriptor as returned by the server's `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpToolDef {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "inputSchema", default)]
    pub input_schema: Value,
}

/// The outcome of a remote `tools/call`.
#[derive(Debug, Clone)]
pub struct McpCallResult {
    /// Text content folded from the response's content blocks
    pub content: String,

    /// The server-side `isError` flag
    pub is_error: bool,
}

/// The session operations the provider layer depends on.
///
/// Kept as a trait so the session lifecycle can be exercised without a
/// live server.
#[async_trait]
pub trait McpChannel: Send + Sync + std::fmt::Debug {
    /// Perform the protocol handshake. Must be called once before use.
    async fn initialize(&self) -> std::result::Result<(), McpError>;

    /// List the tools the server offers.
    async fn list_tools(&self) -> std::result::Result<Vec<McpToolDef>, McpError>;

    /// Invoke a tool by its server-side name.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> std::result::Result<McpCallResult, McpError>;

    /// Tear the channel down. Best-effort; never fails.
    async fn shutdown(&self);
}

/// A live MCP session over one of the two transports.
#[derive(Debug)]
pub struct McpSession {
    transport: Transport,
    next_id: AtomicI64,
}

#[derive(Debug)]
enum Transport {
    Stdio(StdioTransport),
    StreamableHttp(HttpTransport),
}

impl McpSession {
    /// Spawn the configured subprocess and wrap its pipes in a session.
    pub async fn connect_stdio(params: &StdioServerParams) -> std::result::Result<Self, McpError> {
        Ok(Self {
            transport: Transport::Stdio(StdioTransport::spawn(params).await?),
            next_id: AtomicI64::new(1),
        })
    }

    /// Build a session against a streamable HTTP endpoint.
    pub fn connect_streamable_http(
        params: &StreamableHttpParams,
    ) -> std::result::Result<Self, McpError> {
        Ok(Self {
            transport: Transport::StreamableHttp(HttpTransport::new(params)?),
            next_id: AtomicI64::new(1),
        })
    }

    async fn request(
        &self,
        method: &str,
        params: Value,
    ) -> std::result::Result<Value, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "MCP request");

        let response = match &self.transport {
            Transport::Stdio(t) => t.round_trip(&payload, id).await?,
            Transport::StreamableHttp(t) => t.round_trip(&payload, id).await?,
        };

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(McpError::Protocol(format!("{method}: {message}")));
        }
        Ok(response.get("result").cloned().unwrap_or(Value::Null))
    }

    async fn notify(&self, method: &str) -> std::result::Result<(), McpError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
        });
        match &self.transport {
            Transport::Stdio(t) => t.send_only(&payload).await,
            Transport::StreamableHttp(t) => t.send_only(&payload).await,
        }
    }
}

#[async_trait]
impl McpChannel for McpSession {
    async fn initialize(&self) -> std::result::Result<(), McpError> {
        self.request(
            "initialize",
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "taskloom",
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }),
        )
        .await?;
        self.notify("notifications/initialized").await
    }

    async fn list_tools(&self) -> std::result::Result<Vec<McpToolDef>, McpError> {
        let result = self.request("tools/list", json!({})).await?;
        serde_json::from_value(result.get("tools").cloned().unwrap_or(Value::Null))
            .map_err(|e| McpError::Protocol(format!("tools/list: {e}")))
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
    ) -> std::result::Result<McpCallResult, McpError> {
        let result = self
            .request(
                "tools/call",
                json!({
                    "name": name,
                    "arguments": arguments,
                }),
            )
            .await?;
        Ok(parse_call_result(&result))
    }

    async fn shutdown(&self) {
        match &self.transport {
            Transport::Stdio(t) => t.shutdown().await,
            Transport::StreamableHttp(_) => {}
        }
    }
}

/// Fold a `tools/call` result into text content plus the error flag.
///
/// Content usually arrives as an array of `{ "type": "text", "text": … }`
/// blocks; non-text blocks are skipped.
fn parse_call_result(result: &Value) -> McpCallResult {
    let content = match result.get("content") {
        Some(Value::Array(blocks)) => blocks
            .iter()
            .filter_map(|b| b.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        Some(other) => other.to_string(),
        None => String::new(),
    };
    let is_error = result
        .get("isError")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    McpCallResult { content, is_error }
}

// ── Stdio transport ──────────────────────────────────────────────────────

#[derive(Debug)]
struct StdioTransport {
    pipe: Mutex<StdioPipe>,
}

#[derive(Debug)]
struct StdioPipe {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl StdioTransport {
    async fn spawn(params: &StdioServerParams) -> std::result::Result<Self, McpError> {
        let mut command = Command::new(&params.command);
        command
            .args(&params.args)
            .envs(&params.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| McpError::Spawn(format!("{}: {e}", params.command)))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Spawn("child stdin not captured".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Spawn("child stdout not captured".into()))?;

        Ok(Self {
            pipe: Mutex::new(StdioPipe {
                child,
                stdin,
                stdout: BufReader::new(stdout),
            }),
        })
    }

    /// Write one request line and read lines until the matching response
    /// id comes back. Server-initiated notifications are skipped.
    async fn round_trip(
        &self,
        payload: &Value,
        id: i64,
    ) -> std::result::Result<Value, McpError> {
        let mut pipe = self.pipe.lock().await;
        write_line(&mut pipe.stdin, payload).await?;

        let mut line = String::new();
        loop {
            line.clear();
            let read = pipe
                .stdout
                .read_line(&mut line)
                .await
                .map_err(|e| McpError::Connection(e.to_string()))?;
            if read == 0 {
                return Err(McpError::Connection("MCP server closed its stdout".into()));
            }
            let Ok(value) = serde_json::from_str::<Value>(line.trim()) else {
                continue;
            };
            if value.get("id").and_then(Value::as_i64) == Some(id) {
                return Ok(value);
            }
        }
    }

    async fn send_only(&self, payload: &Value) -> std::result::Result<(), McpError> {
        let mut pipe = self.pipe.lock().await;
        write_line(&mut pipe.stdin, payload).await
    }

    async fn shutdown(&self) {
        let mut pipe = self.pipe.lock().await;
        if let Err(e) = pipe.child.kill().await {
            warn!(error = %e, "Failed to kill MCP server process");
        }
    }
}

async fn write_line(
    stdin: &mut ChildStdin,
    payload: &Value,
) -> std::result::Result<(), McpError> {
    let mut line = payload.to_string();
    line.push('\n');
    stdin
        .write_all(line.as_bytes())
        .await
        .map_err(|e| McpError::Connection(e.to_string()))?;
    stdin
        .flush()
        .await
        .map_err(|e| McpError::Connection(e.to_string()))
}

// ── Streamable HTTP transport ────────────────────────────────────────────

#[derive(Debug)]
struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    fn new(params: &StreamableHttpParams) -> std::result::Result<Self, McpError> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (key, value) in &params.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| McpError::Connection(format!("invalid header {key}: {e}")))?;
            let value = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| McpError::Connection(format!("invalid header {key}: {e}")))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| McpError::Connection(e.to_string()))?;

        Ok(Self {
            client,
            url: params.url.clone(),
        })
    }

    async fn round_trip(
        &self,
        payload: &Value,
        id: i64,
    ) -> std::result::Result<Value, McpError> {
        let response = self
            .client
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .json(payload)
            .send()
            .await
            .map_err(|e| McpError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| McpError::Connection(e.to_string()))?;
        if !status.is_success() {
            return Err(McpError::Connection(format!(
                "server returned {status}: {body}"
            )));
        }

        parse_http_body(&body, id)
    }

    async fn send_only(&self, payload: &Value) -> std::result::Result<(), McpError> {
        self.client
            .post(&self.url)
            .header("Accept", "application/json, text/event-stream")
            .json(payload)
            .send()
            .await
            .map_err(|e| McpError::Connection(e.to_string()))?;
        Ok(())
    }
}

/// A streamable HTTP response body is either one JSON document or an SSE
/// stream whose `data:` lines carry JSON-RPC messages.
fn parse_http_body(body: &str, id: i64) -> std::result::Result<Value, McpError> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') {
        return serde_json::from_str(trimmed)
            .map_err(|e| McpError::Protocol(format!("invalid JSON body: {e}")));
    }

    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<Value>(data.trim()) else {
            continue;
        };
        if value.get("id").and_then(Value::as_i64) == Some(id) {
            return Ok(value);
        }
    }
    Err(McpError::Protocol(
        "no matching response in event stream".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_defs_parse_from_list_response() {
        let result = json!({
            "tools": [
                {
                    "name": "fetch",
                    "description": "Fetch a URL",
                    "inputSchema": {"type": "object", "properties": {"url": {"type": "string"}}}
                },
                { "name": "bare" }
            ]
        });
        let tools: Vec<McpToolDef> = serde_json::from_value(result["tools"].clone()).unwrap();
        assert_eq!(tools.len(), 2);
        assert_eq!(tools[0].name, "fetch");
        assert_eq!(tools[0].input_schema["type"], "object");
        assert!(tools[1].description.is_empty());
    }

    #[test]
    fn call_result_folds_text_blocks() {
        let result = json!({
            "content": [
                {"type": "text", "text": "first"},
                {"type": "image", "data": "…"},
                {"type": "text", "text": "second"}
            ]
        });
        let parsed = parse_call_result(&result);
        assert_eq!(parsed.content, "first\nsecond");
        assert!(!parsed.is_error);
    }

    #[test]
    fn call_result_carries_error_flag() {
        let result = json!({
            "content": [{"type": "text", "text": "boom"}],
            "isError": true
        });
        let parsed = parse_call_result(&result);
        assert!(parsed.is_error);
        assert_eq!(parsed.content, "boom");
    }

    #[test]
    fn http_body_plain_json() {
        let body = r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#;
        let value = parse_http_body(body, 3).unwrap();
        assert_eq!(value["result"]["ok"], true);
    }

    #[test]
    fn http_body_event_stream_picks_matching_id() {
        let body = concat!(
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"method\":\"notifications/progress\"}\n",
            "\n",
            "event: message\n",
            "data: {\"jsonrpc\":\"2.0\",\"id\":7,\"result\":{\"tools\":[]}}\n",
        );
        let value = parse_http_body(body, 7).unwrap();
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn http_body_without_match_is_protocol_error() {
        let err = parse_http_body("event: message\n\n", 1).unwrap_err();
        assert!(matches!(err, McpError::Protocol(_)));
    }
}
