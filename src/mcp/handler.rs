//! MCP request handling for the streamable HTTP transport.
//!
//! `McpServer` is transport-neutral: it takes the raw POST body plus the session header
//! and produces an `McpReply` (status, optional JSON body, optional new session id).
//! The HTTP layer only maps that onto a hyper response.

use crate::core::tools::{tool_definitions, LegalTools};
use crate::mcp::jsonrpc::{
    error_codes, InitializeParams, JsonRpcRequest, JsonRpcResponse, ToolResultBody,
};
use crate::mcp::session::SessionStore;
use serde_json::{json, Value};
use std::sync::Arc;

pub const LATEST_PROTOCOL_VERSION: &str = "2025-03-26";
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

#[derive(Debug, Clone, PartialEq)]
pub struct McpReply {
    pub status: u16,
    pub body: Option<Value>,
    /// Set when this exchange created a session.
    pub session_id: Option<String>,
}

impl McpReply {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            body: Some(body),
            session_id: None,
        }
    }

    fn accepted() -> Self {
        Self {
            status: 202,
            body: None,
            session_id: None,
        }
    }

    fn transport_error(status: u16, code: i32, message: &str) -> Self {
        Self::json(
            status,
            json!({
                "jsonrpc": "2.0",
                "id": "server-error",
                "error": {"code": code, "message": message}
            }),
        )
    }
}

pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(LATEST_PROTOCOL_VERSION)
}

pub struct McpServer {
    name: String,
    version: String,
    tools: Arc<LegalTools>,
    sessions: SessionStore,
}

impl McpServer {
    pub fn new(name: impl Into<String>, tools: Arc<LegalTools>) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            tools,
            sessions: SessionStore::new(),
        }
    }

    pub async fn handle_post(&self, session_header: Option<&str>, body: &[u8]) -> McpReply {
        let payload: Value = match serde_json::from_slice(body) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("❌ MCP 請求 JSON 解析失敗: {}", e);
                let response =
                    JsonRpcResponse::failure(Value::Null, error_codes::PARSE_ERROR, "Parse error");
                return McpReply::json(400, to_value(&response));
            }
        };

        let (messages, is_batch) = match payload {
            Value::Array(items) if items.is_empty() => {
                let response = JsonRpcResponse::failure(
                    Value::Null,
                    error_codes::INVALID_REQUEST,
                    "Invalid Request: empty batch",
                );
                return McpReply::json(400, to_value(&response));
            }
            Value::Array(items) => (items, true),
            other => (vec![other], false),
        };

        let has_initialize = messages
            .iter()
            .any(|m| m.get("method").and_then(Value::as_str) == Some("initialize"));

        let mut session_id = None;
        if has_initialize {
            if is_batch && messages.len() > 1 {
                let response = JsonRpcResponse::failure(
                    Value::Null,
                    error_codes::INVALID_REQUEST,
                    "Invalid Request: initialize must not be batched",
                );
                return McpReply::json(400, to_value(&response));
            }
        } else {
            match session_header {
                None => {
                    return McpReply::transport_error(
                        400,
                        error_codes::INVALID_REQUEST,
                        "Bad Request: Missing session ID",
                    )
                }
                Some(id) if !self.sessions.touch(id) => {
                    return McpReply::transport_error(
                        404,
                        error_codes::SESSION_NOT_FOUND,
                        "Session not found",
                    )
                }
                Some(id) => session_id = Some(id.to_string()),
            }
        }

        let mut responses = Vec::new();
        let mut created_session = None;
        for message in messages {
            let (response, created) = self.handle_message(message, session_id.as_deref()).await;
            if let Some(id) = created {
                created_session = Some(id);
            }
            if let Some(response) = response {
                responses.push(response);
            }
        }

        let mut reply = if responses.is_empty() {
            McpReply::accepted()
        } else if is_batch {
            McpReply::json(200, Value::Array(responses.iter().map(to_value).collect()))
        } else {
            McpReply::json(200, to_value(&responses[0]))
        };
        reply.session_id = created_session;
        reply
    }

    pub fn handle_delete(&self, session_header: Option<&str>) -> McpReply {
        match session_header {
            None => McpReply::transport_error(
                400,
                error_codes::INVALID_REQUEST,
                "Bad Request: Missing session ID",
            ),
            Some(id) if self.sessions.remove(id) => {
                tracing::info!("🗑️ MCP session 已終止: {}", id);
                McpReply {
                    status: 200,
                    body: None,
                    session_id: None,
                }
            }
            Some(_) => McpReply::transport_error(
                404,
                error_codes::SESSION_NOT_FOUND,
                "Session not found",
            ),
        }
    }

    /// Returns the response (None for notifications and client responses) and the id
    /// of a session created by `initialize`.
    async fn handle_message(
        &self,
        message: Value,
        session_id: Option<&str>,
    ) -> (Option<JsonRpcResponse>, Option<String>) {
        // Responses to server requests; nothing is ever sent that expects one.
        if message.get("method").is_none()
            && (message.get("result").is_some() || message.get("error").is_some())
        {
            return (None, None);
        }

        let raw_id = message.get("id").cloned().unwrap_or(Value::Null);
        let request: JsonRpcRequest = match serde_json::from_value(message) {
            Ok(r) => r,
            Err(e) => {
                return (
                    Some(JsonRpcResponse::failure(
                        raw_id,
                        error_codes::INVALID_REQUEST,
                        format!("Invalid Request: {}", e),
                    )),
                    None,
                )
            }
        };

        if request.jsonrpc != "2.0" {
            return (
                Some(JsonRpcResponse::failure(
                    request.id.unwrap_or(Value::Null),
                    error_codes::INVALID_REQUEST,
                    "Invalid Request: jsonrpc must be \"2.0\"",
                )),
                None,
            );
        }

        if request.is_notification() {
            self.handle_notification(&request, session_id);
            return (None, None);
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        tracing::debug!("MCP 方法: {} (id: {})", request.method, id);

        match request.method.as_str() {
            "initialize" => {
                let (result, created) = self.initialize(&request);
                (Some(JsonRpcResponse::success(id, result)), Some(created))
            }
            "ping" => (Some(JsonRpcResponse::success(id, json!({}))), None),
            "tools/list" => {
                let result = json!({ "tools": tool_definitions() });
                (Some(JsonRpcResponse::success(id, result)), None)
            }
            "tools/call" => (Some(self.call_tool(id, &request).await), None),
            other => (
                Some(JsonRpcResponse::failure(
                    id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Method not found: {}", other),
                )),
                None,
            ),
        }
    }

    fn handle_notification(&self, request: &JsonRpcRequest, session_id: Option<&str>) {
        match (request.method.as_str(), session_id) {
            ("notifications/initialized", Some(id)) => {
                if let Some(session) = self.sessions.mark_initialized(id) {
                    tracing::info!(
                        "✅ MCP session 初始化完成: {} (client={} protocol={})",
                        session.id,
                        session.client_name.as_deref().unwrap_or("unknown"),
                        session.protocol_version
                    );
                }
            }
            (method, _) => tracing::debug!("收到通知: {}", method),
        }
    }

    fn initialize(&self, request: &JsonRpcRequest) -> (Value, String) {
        let params: InitializeParams =
            serde_json::from_value(request.params.clone()).unwrap_or_default();
        let version = negotiate_protocol_version(params.protocol_version.as_deref());
        let client_name = params.client_info.map(|c| c.name);

        let session = self.sessions.create(version, client_name.clone());
        tracing::info!(
            "🤝 MCP initialize: client={} protocol={} session={} (active: {})",
            client_name.as_deref().unwrap_or("unknown"),
            version,
            session.id,
            self.sessions.len()
        );

        let result = json!({
            "protocolVersion": version,
            "capabilities": {"tools": {"listChanged": false}},
            "serverInfo": {"name": self.name, "version": self.version}
        });
        (result, session.id)
    }

    async fn call_tool(&self, id: Value, request: &JsonRpcRequest) -> JsonRpcResponse {
        let Some(params) = request.tool_params() else {
            return JsonRpcResponse::failure(
                id,
                error_codes::INVALID_PARAMS,
                "Invalid params: expected {name, arguments}",
            );
        };

        tracing::info!("🔧 tools/call: {}", params.name);
        match self.tools.call(&params.name, params.arguments).await {
            Ok(value) => JsonRpcResponse::success(id, to_value(&ToolResultBody::structured(value))),
            Err(e) => {
                tracing::warn!("⚠️ tools/call 被拒絕: {}", e);
                JsonRpcResponse::failure(id, error_codes::INVALID_PARAMS, e.to_string())
            }
        }
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        json!({
            "jsonrpc": "2.0",
            "id": null,
            "error": {"code": error_codes::INTERNAL_ERROR, "message": e.to_string()}
        })
    })
}
