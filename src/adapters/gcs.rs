use crate::adapters::ensure_success;
use crate::domain::model::GcsUri;
use crate::domain::ports::{ObjectStore, TokenProvider};
use crate::utils::error::{Result, ServerError};
use async_trait::async_trait;
use std::sync::Arc;
use url::Url;

/// Cloud Storage JSON API, simple media upload.
pub struct GcsClient {
    client: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn TokenProvider>,
}

impl GcsClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn upload_url(&self, bucket: &str, object: &str) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint).map_err(|e| ServerError::ConfigError {
            message: format!("invalid storage endpoint {}: {}", self.endpoint, e),
        })?;
        url.path_segments_mut()
            .map_err(|_| ServerError::ConfigError {
                message: format!("storage endpoint cannot be a base: {}", self.endpoint),
            })?
            .pop_if_empty()
            .extend(["upload", "storage", "v1", "b", bucket, "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", object);
        Ok(url)
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<GcsUri> {
        let url = self.upload_url(bucket, object)?;
        let token = self.tokens.access_token().await?;

        tracing::debug!("Uploading {} bytes to gs://{}/{}", data.len(), bucket, object);
        let response = self
            .client
            .post(url)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await?;
        ensure_success("storage", response).await?;

        Ok(GcsUri::new(bucket, object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::StaticToken;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn test_upload_posts_media() {
        let server = MockServer::start_async().await;
        let upload_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/upload/storage/v1/b/legal-doc-bucket1/o")
                    .query_param("uploadType", "media")
                    .query_param("name", "lease-agreement.pdf")
                    .header("authorization", "Bearer test-token")
                    .header("content-type", "application/pdf")
                    .body("%PDF-1.4");
                then.status(200).json_body(serde_json::json!({
                    "bucket": "legal-doc-bucket1",
                    "name": "lease-agreement.pdf"
                }));
            })
            .await;

        let gcs = GcsClient::new(
            reqwest::Client::new(),
            server.base_url(),
            Arc::new(StaticToken::new("test-token")),
        );

        let uri = gcs
            .upload(
                "legal-doc-bucket1",
                "lease-agreement.pdf",
                b"%PDF-1.4".to_vec(),
                "application/pdf",
            )
            .await
            .unwrap();

        upload_mock.assert_async().await;
        assert_eq!(uri.to_string(), "gs://legal-doc-bucket1/lease-agreement.pdf");
    }

    #[tokio::test]
    async fn test_upload_forbidden() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/upload/storage/v1/b/private/o");
                then.status(403).body("caller does not have storage.objects.create");
            })
            .await;

        let gcs = GcsClient::new(
            reqwest::Client::new(),
            server.base_url(),
            Arc::new(StaticToken::new("t")),
        );
        let err = gcs
            .upload("private", "a.pdf", vec![1, 2, 3], "application/pdf")
            .await
            .unwrap_err();

        match err {
            ServerError::UpstreamError { service, status, body } => {
                assert_eq!(service, "storage");
                assert_eq!(status, 403);
                assert!(body.contains("storage.objects.create"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
