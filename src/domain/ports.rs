use crate::domain::document::Document;
use crate::domain::model::{GcsUri, GenerateRequest, GenerateResponse};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Local file storage (the `uploads/` copy of every PDF).
pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// OAuth2 bearer token for Google APIs.
    async fn access_token(&self) -> Result<String>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<GcsUri>;
}

#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process(&self, gcs_uri: &GcsUri) -> Result<Document>;
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse>;

    /// Streamed generation collected into its chunks.
    async fn generate_stream(&self, request: &GenerateRequest) -> Result<Vec<GenerateResponse>> {
        Ok(vec![self.generate(request).await?])
    }

    fn model_name(&self) -> &str;
}

#[async_trait]
pub trait GlossaryLookup: Send + Sync {
    /// `None` on any lookup failure; the caller falls back to the model.
    async fn define(&self, term: &str) -> Option<String>;
}
