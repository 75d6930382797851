use crate::adapters::ensure_success;
use crate::config::DocumentAiSettings;
use crate::domain::document::Document;
use crate::domain::model::GcsUri;
use crate::domain::ports::{DocumentProcessor, TokenProvider};
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest<'a> {
    gcs_document: GcsDocument<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GcsDocument<'a> {
    gcs_uri: &'a str,
    mime_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProcessResponse {
    #[serde(default)]
    document: Document,
}

pub struct DocumentAiClient {
    client: reqwest::Client,
    settings: DocumentAiSettings,
    project_id: String,
    tokens: Arc<dyn TokenProvider>,
}

impl DocumentAiClient {
    pub fn new(
        client: reqwest::Client,
        settings: DocumentAiSettings,
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

    /// `projects/{p}/locations/{l}/processors/{id}`
    pub fn processor_name(&self) -> String {
        format!(
            "projects/{}/locations/{}/processors/{}",
            self.project_id, self.settings.location, self.settings.processor_id
        )
    }
}

#[async_trait]
impl DocumentProcessor for DocumentAiClient {
    async fn process(&self, gcs_uri: &GcsUri) -> Result<Document> {
        let url = format!(
            "{}/v1/{}:process",
            self.settings.endpoint.trim_end_matches('/'),
            self.processor_name()
        );
        let uri = gcs_uri.to_string();
        let request = ProcessRequest {
            gcs_document: GcsDocument {
                gcs_uri: &uri,
                mime_type: "application/pdf",
            },
        };

        let token = self.tokens.access_token().await?;
        tracing::debug!("Document AI process request for {}", uri);

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        let response = ensure_success("documentai", response).await?;
        let body: ProcessResponse = response.json().await?;

        tracing::debug!(
            "Document AI returned {} pages, {} characters",
            body.document.pages.len(),
            body.document.text.chars().count()
        );
        Ok(body.document)
    }
}
