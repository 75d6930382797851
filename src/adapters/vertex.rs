use crate::adapters::ensure_success;
use crate::config::GeminiSettings;
use crate::domain::model::{GenerateRequest, GenerateResponse};
use crate::domain::ports::{GenerativeModel, TokenProvider};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Gemini on Vertex AI (`publishers/google/models/*`).
pub struct VertexGemini {
    client: reqwest::Client,
    settings: GeminiSettings,
    project_id: String,
    tokens: Arc<dyn TokenProvider>,
}

impl VertexGemini {
    pub fn new(
        client: reqwest::Client,
        settings: GeminiSettings,
        project_id: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client,
            settings,
            project_id: project_id.into(),
            tokens,
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/v1/projects/{}/locations/{}/publishers/google/models/{}:{}",
            self.settings.endpoint.trim_end_matches('/'),
            self.project_id,
            self.settings.location,
            self.settings.model,
            method
        )
    }

    async fn post(&self, method: &str, request: &GenerateRequest) -> Result<reqwest::Response> {
        let token = self.tokens.access_token().await?;
        tracing::debug!(
            "Calling {} {} with {} content turns",
            self.settings.model,
            method,
            request.contents.len()
        );

        let response = self
            .client
            .post(self.method_url(method))
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        ensure_success("vertexai", response).await
    }
}

#[async_trait]
impl GenerativeModel for VertexGemini {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse> {
        let response = self.post("generateContent", request).await?;
        Ok(response.json().await?)
    }

    /// Without `alt=sse` the stream endpoint answers with one JSON array of chunks.
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<Vec<GenerateResponse>> {
        let response = self.post("streamGenerateContent", request).await?;
        let chunks: Vec<GenerateResponse> = response.json().await?;
        tracing::debug!("Received {} streamed chunks", chunks.len());
        Ok(chunks)
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::StaticToken;
    use httpmock::prelude::*;

    fn gemini(endpoint: String) -> VertexGemini {
        VertexGemini::new(
            reqwest::Client::new(),
            GeminiSettings {
                model: "gemini-2.5-flash-lite".to_string(),
                location: "us-central1".to_string(),
                endpoint,
            },
            "demo",
            Arc::new(StaticToken::new("tok")),
        )
    }

    #[tokio::test]
    async fn test_generate_content() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/projects/demo/locations/us-central1/publishers/google/models/gemini-2.5-flash-lite:generateContent")
                    .header("authorization", "Bearer tok")
                    .body_contains("\"role\":\"user\"");
                then.status(200).json_body(serde_json::json!({
                    "candidates": [{
                        "content": {"role": "model", "parts": [{"text": "1. Carlill v Carbolic Smoke Ball Co"}]},
                        "finishReason": "STOP"
                    }]
                }));
            })
            .await;

        let model = gemini(server.base_url());
        let response = model
            .generate(&GenerateRequest::from_prompt("find precedents"))
            .await
            .unwrap();

        mock.assert_async().await;
        let content = response.first_content().unwrap();
        assert_eq!(
            content.parts[0].text.as_deref(),
            Some("1. Carlill v Carbolic Smoke Ball Co")
        );
    }

    #[tokio::test]
    async fn test_stream_generate_content_array() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path_contains(":streamGenerateContent");
                then.status(200).json_body(serde_json::json!([
                    {"candidates": [{"content": {"role": "model", "parts": [{"text": "Under Section 73 "}]}}]},
                    {"candidates": [{"content": {"role": "model", "parts": [{"text": "damages apply."}]}}]}
                ]));
            })
            .await;

        let chunks = gemini(server.base_url())
            .generate_stream(&GenerateRequest::from_prompt("q"))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[tokio::test]
    async fn test_quota_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(429).body("RESOURCE_EXHAUSTED");
            })
            .await;

        let err = gemini(server.base_url())
            .generate(&GenerateRequest::from_prompt("q"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "vertexai returned 429: RESOURCE_EXHAUSTED");
    }
}
