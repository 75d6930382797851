// App layer: wires the resolved configuration into adapters, services and server state

use crate::adapters::auth::{MetadataServerToken, StaticToken};
use crate::adapters::document_ai::DocumentAiClient;
use crate::adapters::gcs::GcsClient;
use crate::adapters::glossary::HttpGlossary;
use crate::adapters::local::LocalStorage;
use crate::adapters::vertex::VertexGemini;
use crate::adapters::build_http_client;
use crate::config::AppConfig;
use crate::core::chat::LegalChat;
use crate::core::ocr::OcrService;
use crate::core::precedents::PrecedentFinder;
use crate::core::tools::LegalTools;
use crate::domain::ports::{GlossaryLookup, TokenProvider};
use crate::mcp::McpServer;
use crate::server::cors::CorsPolicy;
use crate::server::AppState;
use crate::utils::error::Result;
use std::sync::Arc;

pub fn token_provider(config: &AppConfig, client: &reqwest::Client) -> Arc<dyn TokenProvider> {
    match &config.auth.access_token {
        Some(token) => {
            tracing::info!("🔑 使用設定提供的 access token");
            Arc::new(StaticToken::new(token.clone()))
        }
        None => {
            tracing::info!(
                "🔑 使用 metadata server 取得 access token: {}",
                config.auth.metadata_endpoint
            );
            Arc::new(MetadataServerToken::new(
                client.clone(),
                config.auth.metadata_endpoint.clone(),
            ))
        }
    }
}

pub fn build_tools(config: &AppConfig) -> Result<LegalTools> {
    let client = build_http_client(config.request_timeout_seconds)?;
    let tokens = token_provider(config, &client);

    let uploads = LocalStorage::new(config.upload_dir.clone());
    uploads.ensure_base_dir()?;

    let object_store = Arc::new(GcsClient::new(
        client.clone(),
        config.storage_endpoint.clone(),
        Arc::clone(&tokens),
    ));
    let processor = Arc::new(DocumentAiClient::new(
        client.clone(),
        config.document_ai.clone(),
        config.project_id.clone(),
        Arc::clone(&tokens),
    ));
    let chat_model = Arc::new(VertexGemini::new(
        client.clone(),
        config.chat.clone(),
        config.project_id.clone(),
        Arc::clone(&tokens),
    ));
    let precedent_model = Arc::new(VertexGemini::new(
        client.clone(),
        config.precedents.clone(),
        config.project_id.clone(),
        Arc::clone(&tokens),
    ));

    let glossary = config.glossary_endpoint.as_ref().map(|endpoint| {
        tracing::info!("📖 啟用術語查詢服務: {}", endpoint);
        Arc::new(HttpGlossary::new(client.clone(), endpoint.clone())) as Arc<dyn GlossaryLookup>
    });

    // 對話附件只能從上傳目錄讀取
    let chat = LegalChat::new(chat_model, glossary, uploads.clone());

    Ok(LegalTools::new(
        uploads,
        object_store,
        chat,
        OcrService::new(processor),
        PrecedentFinder::new(precedent_model),
        config.bucket_name.clone(),
    ))
}

pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let tools = Arc::new(build_tools(config)?);
    Ok(AppState {
        mcp: McpServer::new(config.mcp_name.clone(), tools),
        cors: CorsPolicy::new(config.allowed_origins.clone()),
        max_body_bytes: config.max_body_bytes,
    })
}
