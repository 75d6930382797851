use crate::domain::ports::GlossaryLookup;
use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct DefinitionResponse {
    definition: Option<String>,
}

/// Remote `get_legal_term_definition` tool reached over plain HTTP.
pub struct HttpGlossary {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGlossary {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl GlossaryLookup for HttpGlossary {
    async fn define(&self, term: &str) -> Option<String> {
        let url = format!("{}/tools/get_legal_term_definition", self.endpoint);

        let response = match self
            .client
            .post(&url)
            .json(&serde_json::json!({ "term": term }))
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Glossary lookup for '{}' failed: {}", term, e);
                return None;
            }
        };

        if response.status() != reqwest::StatusCode::OK {
            tracing::debug!("Glossary returned {} for '{}'", response.status(), term);
            return None;
        }

        response
            .json::<DefinitionResponse>()
            .await
            .ok()
            .and_then(|body| body.definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_define_returns_definition() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/tools/get_legal_term_definition")
                    .json_body(serde_json::json!({"term": "indemnity"}));
                then.status(200).json_body(serde_json::json!({
                    "definition": "A promise to compensate for loss."
                }));
            })
            .await;

        let glossary = HttpGlossary::new(reqwest::Client::new(), server.base_url());
        assert_eq!(
            glossary.define("indemnity").await.as_deref(),
            Some("A promise to compensate for loss.")
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_define_none_on_error_or_missing_key() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).json_body(serde_json::json!({"term": "tort"}));
                then.status(200).json_body(serde_json::json!({"detail": "unknown"}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST).json_body(serde_json::json!({"term": "lien"}));
                then.status(500);
            })
            .await;

        let glossary = HttpGlossary::new(reqwest::Client::new(), server.base_url());
        assert!(glossary.define("tort").await.is_none());
        assert!(glossary.define("lien").await.is_none());
    }
}
