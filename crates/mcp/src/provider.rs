//! MCP tool provider — one persistent session to a remote tool source.
//!
//! The session is created lazily on first use, shared by every caller,
//! and lives until an explicit `close()`. Startup is single-flight: no
//! matter how many tasks request the session while it is starting, only
//! one connection attempt runs, and everyone receives the same handle.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use taskloom_core::error::{McpError, ProviderError};
use taskloom_core::provider::ToolProvider;
use taskloom_core::tool::AgentTool;

use crate::session::{McpChannel, McpSession, StdioServerParams, StreamableHttpParams};
use crate::tool::McpTool;

/// Where a provider's session is in its lifecycle.
///
/// `Closed` and `Uninitialized` are equivalent for callers: the next
/// `session()` starts a fresh lifetime segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Starting,
    Ready,
    Closing,
    Closed,
}

/// What waiters observe on the readiness channel.
#[derive(Clone)]
enum StartupState {
    Pending,
    Ready(Arc<dyn McpChannel>),
    Failed(McpError),
}

/// Creates the underlying channel. A seam so the lifecycle can be tested
/// without a live server.
#[async_trait]
pub(crate) trait Connect: Send + Sync {
    async fn connect(&self) -> std::result::Result<Arc<dyn McpChannel>, McpError>;
}

/// The real connector: spawn a subprocess or open the HTTP endpoint.
struct TransportConnector {
    stdio: Option<StdioServerParams>,
    http: Option<StreamableHttpParams>,
}

#[async_trait]
impl Connect for TransportConnector {
    async fn connect(&self) -> std::result::Result<Arc<dyn McpChannel>, McpError> {
        if let Some(stdio) = &self.stdio {
            return Ok(Arc::new(McpSession::connect_stdio(stdio).await?));
        }
        if let Some(http) = &self.http {
            return Ok(Arc::new(McpSession::connect_streamable_http(http)?));
        }
        Err(McpError::MissingServerParams)
    }
}

#[derive(Default)]
struct SessionSlot {
    phase: SessionPhase,
    /// Bumped every time a new lifetime segment starts; lets a stale
    /// background task recognize that the slot has moved on without it.
    segment: u64,
    session: Option<Arc<dyn McpChannel>>,
    ready_rx: Option<watch::Receiver<StartupState>>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

struct ProviderCore {
    name: String,
    connector: Arc<dyn Connect>,
    slot: Mutex<SessionSlot>,
}

/// A provider of tools served by a remote MCP server.
///
/// Cheap to clone; all clones share the same session.
#[derive(Clone)]
pub struct McpToolProvider {
    core: Arc<ProviderCore>,
}

impl std::fmt::Debug for McpToolProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpToolProvider")
            .field("name", &self.core.name)
            .finish()
    }
}

impl McpToolProvider {
    /// Create a provider from optional stdio and streamable-HTTP params.
    ///
    /// At least one must be given. When both are given, stdio wins and
    /// the HTTP endpoint is ignored (with a warning).
    pub fn new(
        name: impl Into<String>,
        stdio: Option<StdioServerParams>,
        http: Option<StreamableHttpParams>,
    ) -> std::result::Result<Self, McpError> {
        if stdio.is_none() && http.is_none() {
            return Err(McpError::MissingServerParams);
        }
        let name = name.into();
        if stdio.is_some() && http.is_some() {
            warn!(
                provider = %name,
                "Both stdio params and a streamable HTTP URL were provided; \
                 stdio wins and the HTTP endpoint is ignored"
            );
        }
        Ok(Self::with_connector(
            name,
            Arc::new(TransportConnector { stdio, http }),
        ))
    }

    /// Create a provider for a subprocess MCP server.
    pub fn stdio(name: impl Into<String>, params: StdioServerParams) -> Self {
        Self::with_connector(
            name.into(),
            Arc::new(TransportConnector {
                stdio: Some(params),
                http: None,
            }),
        )
    }

    /// Create a provider for a streamable-HTTP MCP server.
    pub fn streamable_http(name: impl Into<String>, params: StreamableHttpParams) -> Self {
        Self::with_connector(
            name.into(),
            Arc::new(TransportConnector {
                stdio: None,
                http: Some(params),
            }),
        )
    }

    pub(crate) fn with_connector(name: impl Into<String>, connector: Arc<dyn Connect>) -> Self {
        Self {
            core: Arc::new(ProviderCore {
                name: name.into(),
                connector,
                slot: Mutex::new(SessionSlot::default()),
            }),
        }
    }

    /// The provider's identity, used to namespace its tools.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The current lifecycle phase.
    pub async fn phase(&self) -> SessionPhase {
        self.core.slot.lock().await.phase
    }

    /// Get the persistent session, establishing it on first use.
    ///
    /// Concurrent callers during startup all wait on the same readiness
    /// signal; exactly one connection attempt runs per lifetime segment.
    pub async fn session(&self) -> std::result::Result<Arc<dyn McpChannel>, McpError> {
        let mut ready_rx = {
            let mut slot = self.core.slot.lock().await;
            if slot.phase == SessionPhase::Ready {
                if let Some(session) = slot.session.clone() {
                    return Ok(session);
                }
            }
            match (slot.phase, slot.ready_rx.clone()) {
                (SessionPhase::Starting, Some(rx)) => rx,
                _ => {
                    let (ready_tx, ready_rx) = watch::channel(StartupState::Pending);
                    let (shutdown_tx, shutdown_rx) = watch::channel(false);
                    slot.phase = SessionPhase::Starting;
                    slot.segment += 1;
                    slot.session = None;
                    slot.ready_rx = Some(ready_rx.clone());
                    slot.shutdown_tx = Some(shutdown_tx);
                    slot.task = Some(tokio::spawn(run_session(
                        Arc::clone(&self.core),
                        slot.segment,
                        ready_tx,
                        shutdown_rx,
                    )));
                    ready_rx
                }
            }
        };

        loop {
            let state = ready_rx.borrow_and_update().clone();
            match state {
                StartupState::Ready(session) => return Ok(session),
                StartupState::Failed(e) => return Err(e),
                StartupState::Pending => {
                    if ready_rx.changed().await.is_err() {
                        return Err(McpError::Connection(
                            "session task terminated before becoming ready".into(),
                        ));
                    }
                }
            }
        }
    }

    /// Fetch the server's tools, namespaced by this provider's name.
    pub async fn get_tools(&self) -> std::result::Result<Vec<McpTool>, McpError> {
        let session = self.session().await?;
        let defs = session.list_tools().await?;
        debug!(provider = %self.core.name, count = defs.len(), "Discovered MCP tools");
        Ok(defs
            .into_iter()
            .map(|def| McpTool::new(self.clone(), def))
            .collect())
    }

    /// Close the persistent session and release its resources.
    ///
    /// A no-op when the session was never started or is already closed.
    /// Teardown errors are logged and swallowed; a later `session()`
    /// call starts the whole sequence over.
    pub async fn close(&self) {
        let (task, shutdown_tx) = {
            let mut slot = self.core.slot.lock().await;
            match slot.phase {
                SessionPhase::Uninitialized | SessionPhase::Closed => return,
                _ => {}
            }
            slot.phase = SessionPhase::Closing;
            slot.session = None;
            slot.ready_rx = None;
            (slot.task.take(), slot.shutdown_tx.take())
        };

        if let Some(tx) = shutdown_tx {
            let _ = tx.send(true);
        }
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(provider = %self.core.name, error = %e, "MCP session task aborted during close");
            }
        }

        let mut slot = self.core.slot.lock().await;
        // A concurrent session() may already have begun a new segment.
        if slot.phase == SessionPhase::Closing {
            slot.phase = SessionPhase::Closed;
        }
    }
}

/// The background task owning one session from connect to teardown.
async fn run_session(
    core: Arc<ProviderCore>,
    segment: u64,
    ready_tx: watch::Sender<StartupState>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let connected = async {
        let channel = core.connector.connect().await?;
        channel.initialize().await?;
        Ok::<_, McpError>(channel)
    }
    .await;

    let channel = match connected {
        Ok(channel) => channel,
        Err(e) => {
            warn!(provider = %core.name, error = %e, "Failed to establish MCP session");
            let mut slot = core.slot.lock().await;
            if slot.phase == SessionPhase::Starting && slot.segment == segment {
                *slot = SessionSlot {
                    segment,
                    ..SessionSlot::default()
                };
            }
            drop(slot);
            let _ = ready_tx.send(StartupState::Failed(e));
            return;
        }
    };

    {
        let mut slot = core.slot.lock().await;
        if slot.phase == SessionPhase::Starting && slot.segment == segment {
            slot.session = Some(Arc::clone(&channel));
            slot.phase = SessionPhase::Ready;
        }
    }
    let _ = ready_tx.send(StartupState::Ready(Arc::clone(&channel)));
    info!(provider = %core.name, "MCP session ready");

    // Hold the session open until shutdown is signalled.
    while !*shutdown_rx.borrow_and_update() {
        if shutdown_rx.changed().await.is_err() {
            break;
        }
    }
    channel.shutdown().await;
    debug!(provider = %core.name, "MCP session torn down");
}

#[async_trait]
impl ToolProvider for McpToolProvider {
    fn name(&self) -> &str {
        &self.core.name
    }

    async fn get_tools(&self) -> std::result::Result<Vec<AgentTool>, ProviderError> {
        let tools = McpToolProvider::get_tools(self).await.map_err(|e| match e {
            McpError::Protocol(reason) => ProviderError::Protocol {
                provider: self.core.name.clone(),
                reason,
            },
            other => ProviderError::Connection {
                provider: self.core.name.clone(),
                reason: other.to_string(),
            },
        })?;
        Ok(tools
            .into_iter()
            .map(|tool| AgentTool::Suspending(Arc::new(tool)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{McpCallResult, McpToolDef};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    /// A channel stub that records shutdown and serves a fixed tool list.
    #[derive(Default, Debug)]
    struct StubChannel {
        tools: Vec<McpToolDef>,
        shut_down: AtomicBool,
    }

    impl StubChannel {
        fn with_tool(name: &str) -> Self {
            Self {
                tools: vec![McpToolDef {
                    name: name.into(),
                    description: format!("{name} tool"),
                    input_schema: serde_json::json!({"type": "object"}),
                }],
                shut_down: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl McpChannel for StubChannel {
        async fn initialize(&self) -> Result<(), McpError> {
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<McpToolDef>, McpError> {
            Ok(self.tools.clone())
        }

        async fn call_tool(
            &self,
            name: &str,
            _arguments: serde_json::Value,
        ) -> Result<McpCallResult, McpError> {
            Ok(McpCallResult {
                content: format!("called {name}"),
                is_error: false,
            })
        }

        async fn shutdown(&self) {
            self.shut_down.store(true, Ordering::SeqCst);
        }
    }

    /// Counts connection attempts and hands out the same stub channel.
    struct CountingConnector {
        attempts: AtomicUsize,
        channel: Arc<StubChannel>,
        delay: Duration,
    }

    impl CountingConnector {
        fn new(channel: StubChannel) -> Arc<Self> {
            Arc::new(Self {
                attempts: AtomicUsize::new(0),
                channel: Arc::new(channel),
                delay: Duration::from_millis(20),
            })
        }
    }

    #[async_trait]
    impl Connect for CountingConnector {
        async fn connect(&self) -> Result<Arc<dyn McpChannel>, McpError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            Ok(Arc::clone(&self.channel) as Arc<dyn McpChannel>)
        }
    }

    /// A connector that always fails.
    struct RefusingConnector {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Connect for RefusingConnector {
        async fn connect(&self) -> Result<Arc<dyn McpChannel>, McpError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(McpError::Connection("connection refused".into()))
        }
    }

    #[test]
    fn construction_requires_connection_params() {
        let err = McpToolProvider::new("invalid", None, None).unwrap_err();
        assert!(matches!(err, McpError::MissingServerParams));
    }

    #[test]
    fn construction_accepts_both_params_with_stdio_precedence() {
        let provider = McpToolProvider::new(
            "both",
            Some(StdioServerParams {
                command: "server".into(),
                args: vec![],
                env: Default::default(),
            }),
            Some(StreamableHttpParams {
                url: "https://mcp.example.com".into(),
                headers: Default::default(),
            }),
        );
        assert!(provider.is_ok());
    }

    #[tokio::test]
    async fn concurrent_session_calls_connect_once() {
        let connector = CountingConnector::new(StubChannel::default());
        let provider = McpToolProvider::with_connector("single", connector.clone());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.session().await })
            })
            .collect();

        let mut sessions = Vec::new();
        for handle in handles {
            sessions.push(handle.await.unwrap().unwrap());
        }

        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
        for session in &sessions[1..] {
            assert!(Arc::ptr_eq(session, &sessions[0]));
        }
        assert_eq!(provider.phase().await, SessionPhase::Ready);
    }

    #[tokio::test]
    async fn session_is_reused_across_calls() {
        let connector = CountingConnector::new(StubChannel::default());
        let provider = McpToolProvider::with_connector("reuse", connector.clone());

        let first = provider.session().await.unwrap();
        let second = provider.session().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_without_open_is_noop() {
        let connector = CountingConnector::new(StubChannel::default());
        let provider = McpToolProvider::with_connector("never", connector.clone());

        provider.close().await;

        assert_eq!(provider.phase().await, SessionPhase::Uninitialized);
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn close_is_idempotent_and_tears_down() {
        let connector = CountingConnector::new(StubChannel::default());
        let provider = McpToolProvider::with_connector("close", connector.clone());

        provider.session().await.unwrap();
        provider.close().await;
        assert!(connector.channel.shut_down.load(Ordering::SeqCst));
        assert_eq!(provider.phase().await, SessionPhase::Closed);

        // Second close is a no-op.
        provider.close().await;
        assert_eq!(provider.phase().await, SessionPhase::Closed);
    }

    #[tokio::test]
    async fn session_after_close_starts_new_segment() {
        let connector = CountingConnector::new(StubChannel::default());
        let provider = McpToolProvider::with_connector("restart", connector.clone());

        provider.session().await.unwrap();
        provider.close().await;
        provider.session().await.unwrap();

        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(provider.phase().await, SessionPhase::Ready);
    }

    #[tokio::test]
    async fn failed_connect_surfaces_and_resets() {
        let connector = Arc::new(RefusingConnector {
            attempts: AtomicUsize::new(0),
        });
        let provider = McpToolProvider::with_connector("refused", connector.clone());

        let err = provider.session().await.unwrap_err();
        assert!(matches!(err, McpError::Connection(_)));
        assert_eq!(provider.phase().await, SessionPhase::Uninitialized);

        // A retry is allowed and attempts a fresh connection.
        let _ = provider.session().await.unwrap_err();
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn get_tools_namespaces_by_provider() {
        let connector = CountingConnector::new(StubChannel::with_tool("fetch"));
        let provider = McpToolProvider::with_connector("weather", connector);

        let tools = provider.get_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(
            taskloom_core::tool::AsyncTool::name(&tools[0]),
            "mcp__weather__fetch"
        );
    }

    #[tokio::test]
    async fn trait_discovery_yields_namespaced_agent_tools() {
        let connector = CountingConnector::new(StubChannel::with_tool("fetch"));
        let provider = McpToolProvider::with_connector("files", connector);

        let tools = ToolProvider::get_tools(&provider).await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "mcp__files__fetch");
    }
}
