#![allow(dead_code)]

use legal_mcp::{app, serve, AppConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const ACCEPT: &str = "application/json, text/event-stream";

/// A running server bound to an ephemeral port; Google endpoints point at `google_url`.
pub struct TestServer {
    pub base_url: String,
    pub upload_dir: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<legal_mcp::Result<()>>,
}

impl TestServer {
    pub async fn start(google_url: &str) -> Self {
        let upload_dir = TempDir::new().unwrap();

        let mut config = AppConfig::default();
        config.host = "127.0.0.1".to_string();
        config.port = 0;
        config.upload_dir = upload_dir.path().to_path_buf();
        config.project_id = "demo".to_string();
        config.storage_endpoint = google_url.to_string();
        config.document_ai.endpoint = google_url.to_string();
        config.chat.endpoint = google_url.to_string();
        config.precedents.endpoint = google_url.to_string();
        config.auth.access_token = Some("test-token".to_string());
        config.max_body_bytes = 64 * 1024;

        let state = Arc::new(app::build_state(&config).unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, state, async move {
            let _ = rx.await;
        }));

        Self {
            base_url: format!("http://{}", address),
            upload_dir,
            shutdown: Some(tx),
            handle,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.unwrap().unwrap();
    }
}

pub async fn post_mcp(
    client: &reqwest::Client,
    server: &TestServer,
    session: Option<&str>,
    body: &Value,
) -> reqwest::Response {
    let mut request = client
        .post(server.url("/mcp"))
        .header("accept", ACCEPT)
        .json(body);
    if let Some(id) = session {
        request = request.header("mcp-session-id", id);
    }
    request.send().await.unwrap()
}

/// Runs the initialize handshake and returns the session id.
pub async fn initialize(client: &reqwest::Client, server: &TestServer) -> String {
    let response = post_mcp(
        client,
        server,
        None,
        &json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-03-26",
                "capabilities": {},
                "clientInfo": {"name": "integration-test", "version": "1.0"}
            }
        }),
    )
    .await;
    assert_eq!(response.status(), 200);
    let session = response
        .headers()
        .get("mcp-session-id")
        .expect("initialize returns a session id")
        .to_str()
        .unwrap()
        .to_string();

    let notified = post_mcp(
        client,
        server,
        Some(&session),
        &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    )
    .await;
    assert_eq!(notified.status(), 202);

    session
}

/// `tools/call` and return the JSON-RPC envelope.
pub async fn call_tool(
    client: &reqwest::Client,
    server: &TestServer,
    session: &str,
    name: &str,
    arguments: Value,
) -> Value {
    let response = post_mcp(
        client,
        server,
        Some(session),
        &json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments}
        }),
    )
    .await;
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

/// The structured tool output of a successful `tools/call`.
pub fn structured(envelope: &Value) -> &Value {
    assert_eq!(envelope["result"]["isError"], false, "envelope: {}", envelope);
    &envelope["result"]["structuredContent"]
}
