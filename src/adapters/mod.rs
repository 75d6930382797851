// Adapters layer: concrete implementations of the domain ports (Google REST APIs, local disk).

pub mod auth;
pub mod document_ai;
pub mod gcs;
pub mod glossary;
pub mod local;
pub mod vertex;

use crate::utils::error::{Result, ServerError};
use std::time::Duration;

const MAX_ERROR_BODY_CHARS: usize = 500;

pub fn build_http_client(timeout_seconds: u64) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(concat!("legal-mcp/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// 非 2xx 回應轉為 UpstreamError，保留截斷後的回應內容
pub(crate) async fn ensure_success(
    service: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    tracing::warn!("{} request failed with status {}", service, status);

    Err(ServerError::UpstreamError {
        service: service.to_string(),
        status: status.as_u16(),
        body,
    })
}
