use crate::mcp::handler::McpReply;
use crate::server::AppState;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{
    HeaderValue, ACCESS_CONTROL_REQUEST_HEADERS, ACCESS_CONTROL_REQUEST_METHOD, ALLOW,
    CONTENT_TYPE, HOST, ORIGIN,
};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;

pub const SESSION_HEADER: &str = "mcp-session-id";

pub type ResponseBody = Full<Bytes>;

pub fn json_response(status: StatusCode, body: &Value) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn empty_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

fn text_response(status: StatusCode, text: &'static str) -> Response<ResponseBody> {
    let mut response = Response::new(Full::new(Bytes::from_static(text.as_bytes())));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

fn method_not_allowed(allow: &'static str) -> Response<ResponseBody> {
    let mut response = json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &json!({"detail": "Method Not Allowed"}),
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static(allow));
    response
}

fn header_str<'a>(request: &'a Request<Incoming>, name: impl hyper::header::AsHeaderName) -> Option<&'a str> {
    request.headers().get(name).and_then(|v| v.to_str().ok())
}

fn is_mcp_path(path: &str) -> bool {
    path == "/mcp" || path == "/mcp/"
}

/// Entry point for every request: routing plus CORS decoration.
pub async fn handle(state: Arc<AppState>, request: Request<Incoming>) -> Response<ResponseBody> {
    let origin = header_str(&request, ORIGIN).map(str::to_string);
    let path = request.uri().path().to_string();

    if path.starts_with("/mcp") {
        tracing::info!(
            "📨 {} {} host={} origin={} mcp-session-id={}",
            request.method(),
            path,
            header_str(&request, HOST).unwrap_or("-"),
            origin.as_deref().unwrap_or("-"),
            header_str(&request, SESSION_HEADER).unwrap_or("-"),
        );
    }

    if request.method() == Method::OPTIONS
        && request.headers().contains_key(ACCESS_CONTROL_REQUEST_METHOD)
    {
        return preflight(&state, origin.as_deref(), &request);
    }

    let mut response = route(&state, &path, request).await;
    state
        .cors
        .apply(origin.as_deref(), response.headers_mut());
    response
}

fn preflight(
    state: &AppState,
    origin: Option<&str>,
    request: &Request<Incoming>,
) -> Response<ResponseBody> {
    let mut response = text_response(StatusCode::OK, "OK");
    let requested = request.headers().get(ACCESS_CONTROL_REQUEST_HEADERS);
    if state
        .cors
        .preflight(origin, requested, response.headers_mut())
    {
        response
    } else {
        tracing::warn!("🚫 CORS preflight 被拒絕: origin={}", origin.unwrap_or("-"));
        text_response(StatusCode::BAD_REQUEST, "Disallowed CORS origin")
    }
}

async fn route(state: &AppState, path: &str, request: Request<Incoming>) -> Response<ResponseBody> {
    match path {
        "/" => match *request.method() {
            Method::GET | Method::HEAD => json_response(
                StatusCode::OK,
                &json!({
                    "message": "LegalDemystifier Backend",
                    "status": "running",
                    "mcp_available": true
                }),
            ),
            _ => method_not_allowed("GET, HEAD"),
        },
        "/health" => match *request.method() {
            Method::GET | Method::HEAD => {
                json_response(StatusCode::OK, &json!({"status": "ok", "mcp": true}))
            }
            _ => method_not_allowed("GET, HEAD"),
        },
        p if is_mcp_path(p) => mcp(state, request).await,
        _ => json_response(StatusCode::NOT_FOUND, &json!({"detail": "Not Found"})),
    }
}

async fn mcp(state: &AppState, request: Request<Incoming>) -> Response<ResponseBody> {
    let session = header_str(&request, SESSION_HEADER).map(str::to_string);

    match *request.method() {
        Method::POST => {
            let body = match read_body(request, state.max_body_bytes).await {
                Ok(body) => body,
                Err(response) => return response,
            };
            let reply = state.mcp.handle_post(session.as_deref(), &body).await;
            mcp_response(reply)
        }
        Method::DELETE => mcp_response(state.mcp.handle_delete(session.as_deref())),
        _ => method_not_allowed("POST, DELETE"),
    }
}

async fn read_body(
    request: Request<Incoming>,
    limit: usize,
) -> std::result::Result<Bytes, Response<ResponseBody>> {
    match Limited::new(request.into_body(), limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            tracing::warn!("⚠️ 請求內容超過上限 {} bytes", limit);
            Err(json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                &json!({"detail": "Request body too large"}),
            ))
        }
        Err(e) => {
            tracing::warn!("⚠️ 讀取請求內容失敗: {}", e);
            Err(json_response(
                StatusCode::BAD_REQUEST,
                &json!({"detail": "Invalid request body"}),
            ))
        }
    }
}

fn mcp_response(reply: McpReply) -> Response<ResponseBody> {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = match &reply.body {
        Some(body) => json_response(status, body),
        None => empty_response(status),
    };

    if let Some(id) = reply.session_id {
        if let Ok(value) = HeaderValue::from_str(&id) {
            response.headers_mut().insert(SESSION_HEADER, value);
        }
    }
    response
}
