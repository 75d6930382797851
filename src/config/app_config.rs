use crate::config::toml_config::TomlConfig;
use crate::config::CliConfig;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_gcs_bucket_name, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_url, Validate,
};
use std::path::PathBuf;

pub const DEFAULT_MCP_NAME: &str = "LegalDemystifierMCP";
pub const DEFAULT_FRONTEND_ORIGIN: &str = "http://localhost:3000";
pub const LOOPBACK_FRONTEND_ORIGIN: &str = "http://127.0.0.1:3000";
pub const DEFAULT_PROJECT_ID: &str = "sodium-coil-470706-f4";
pub const DEFAULT_BUCKET_NAME: &str = "legal-doc-bucket1";
pub const DEFAULT_PROCESSOR_ID: &str = "18d898182b219656";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";

#[derive(Debug, Clone)]
pub struct DocumentAiSettings {
    pub location: String,
    pub processor_id: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub model: String,
    pub location: String,
    pub endpoint: String,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub access_token: Option<String>,
    pub metadata_endpoint: String,
}

/// Fully resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub mcp_name: String,
    pub allowed_origins: Vec<String>,
    pub upload_dir: PathBuf,
    pub max_body_bytes: usize,
    pub project_id: String,
    pub bucket_name: String,
    pub storage_endpoint: String,
    pub document_ai: DocumentAiSettings,
    pub chat: GeminiSettings,
    pub precedents: GeminiSettings,
    pub auth: AuthSettings,
    pub glossary_endpoint: Option<String>,
    pub request_timeout_seconds: u64,
}

pub fn document_ai_endpoint(location: &str) -> String {
    format!("https://{}-documentai.googleapis.com", location)
}

/// `global` 沒有區域前綴
pub fn vertex_endpoint(location: &str) -> String {
    if location == "global" {
        "https://aiplatform.googleapis.com".to_string()
    } else {
        format!("https://{}-aiplatform.googleapis.com", location)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mcp_name: DEFAULT_MCP_NAME.to_string(),
            allowed_origins: vec![
                DEFAULT_FRONTEND_ORIGIN.to_string(),
                LOOPBACK_FRONTEND_ORIGIN.to_string(),
            ],
            upload_dir: PathBuf::from("uploads"),
            max_body_bytes: 32 * 1024 * 1024,
            project_id: DEFAULT_PROJECT_ID.to_string(),
            bucket_name: DEFAULT_BUCKET_NAME.to_string(),
            storage_endpoint: "https://storage.googleapis.com".to_string(),
            document_ai: DocumentAiSettings {
                location: "us".to_string(),
                processor_id: DEFAULT_PROCESSOR_ID.to_string(),
                endpoint: document_ai_endpoint("us"),
            },
            chat: GeminiSettings {
                model: DEFAULT_GEMINI_MODEL.to_string(),
                location: "global".to_string(),
                endpoint: vertex_endpoint("global"),
            },
            precedents: GeminiSettings {
                model: DEFAULT_GEMINI_MODEL.to_string(),
                location: "us-central1".to_string(),
                endpoint: vertex_endpoint("us-central1"),
            },
            auth: AuthSettings {
                access_token: None,
                metadata_endpoint: "http://metadata.google.internal".to_string(),
            },
            glossary_endpoint: None,
            request_timeout_seconds: 60,
        }
    }
}

impl AppConfig {
    /// 預設值 → TOML 檔案 → 環境變數 → 命令列參數
    pub fn load(cli: &CliConfig) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = &cli.config {
            tracing::info!("📁 Loading configuration from: {}", path);
            let file = TomlConfig::from_file(path)?;
            config.apply_toml(&file);
        }

        config.apply_env(|key| std::env::var(key).ok());

        if let Some(host) = &cli.host {
            config.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.port = port;
        }

        Ok(config)
    }

    pub fn apply_toml(&mut self, file: &TomlConfig) {
        if let Some(server) = &file.server {
            set_if_some(&mut self.host, &server.host);
            if let Some(port) = server.port {
                self.port = port;
            }
            set_if_some(&mut self.mcp_name, &server.mcp_name);
            if let Some(dir) = &server.upload_dir {
                self.upload_dir = PathBuf::from(dir);
            }
            if let Some(limit) = server.max_body_bytes {
                self.max_body_bytes = limit;
            }
        }

        if let Some(cors) = &file.cors {
            if let Some(origin) = &cors.frontend_origin {
                self.set_frontend_origin(origin);
            }
            if let Some(extra) = &cors.extra_origins {
                for origin in extra {
                    if !self.allowed_origins.contains(origin) {
                        self.allowed_origins.push(origin.clone());
                    }
                }
            }
        }

        if let Some(google) = &file.google {
            set_if_some(&mut self.project_id, &google.project_id);
            if google.access_token.is_some() {
                self.auth.access_token = google.access_token.clone();
            }
            set_if_some(&mut self.auth.metadata_endpoint, &google.metadata_endpoint);
            if let Some(timeout) = google.request_timeout_seconds {
                self.request_timeout_seconds = timeout;
            }
        }

        if let Some(storage) = &file.storage {
            set_if_some(&mut self.bucket_name, &storage.bucket_name);
            set_if_some(&mut self.storage_endpoint, &storage.endpoint);
        }

        if let Some(section) = &file.document_ai {
            if let Some(location) = &section.location {
                self.document_ai.location = location.clone();
                self.document_ai.endpoint = document_ai_endpoint(location);
            }
            set_if_some(&mut self.document_ai.processor_id, &section.processor_id);
            set_if_some(&mut self.document_ai.endpoint, &section.endpoint);
        }

        if let Some(section) = &file.gemini {
            apply_gemini_section(&mut self.chat, section);
        }
        if let Some(section) = &file.precedents {
            apply_gemini_section(&mut self.precedents, section);
        }

        if let Some(glossary) = &file.glossary {
            if glossary.endpoint.is_some() {
                self.glossary_endpoint = glossary.endpoint.clone();
            }
        }
    }

    /// 套用環境變數覆寫；`lookup` 抽離以便測試時不動到行程環境
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(name) = non_empty("MCP_NAME") {
            self.mcp_name = name;
        }
        if let Some(origin) = non_empty("FRONTEND_ORIGIN") {
            self.set_frontend_origin(&origin);
        }
        if let Some(project) = non_empty("PROJECT_ID") {
            self.project_id = project;
        }
        if let Some(bucket) = non_empty("BUCKET_NAME") {
            self.bucket_name = bucket;
        }
        if let Some(token) = non_empty("GOOGLE_ACCESS_TOKEN") {
            self.auth.access_token = Some(token);
        }
        if let Some(processor) = non_empty("DOCUMENT_AI_PROCESSOR_ID") {
            self.document_ai.processor_id = processor;
        }
        if let Some(endpoint) = non_empty("GLOSSARY_ENDPOINT") {
            self.glossary_endpoint = Some(endpoint);
        }
        if let Some(dir) = non_empty("UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
    }

    /// The first allowed origin is the configurable front-end, the loopback one always stays.
    fn set_frontend_origin(&mut self, origin: &str) {
        if let Some(first) = self.allowed_origins.first_mut() {
            *first = origin.to_string();
        } else {
            self.allowed_origins.push(origin.to_string());
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn set_if_some(target: &mut String, value: &Option<String>) {
    if let Some(v) = value {
        *target = v.clone();
    }
}

fn apply_gemini_section(
    target: &mut GeminiSettings,
    section: &crate::config::toml_config::GeminiSection,
) {
    set_if_some(&mut target.model, &section.model);
    if let Some(location) = &section.location {
        target.location = location.clone();
        target.endpoint = vertex_endpoint(location);
    }
    set_if_some(&mut target.endpoint, &section.endpoint);
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("host", &self.host)?;
        validate_positive_number("port", self.port as usize, 1)?;
        validate_non_empty_string("mcp_name", &self.mcp_name)?;

        for origin in &self.allowed_origins {
            validate_url("cors.allowed_origins", origin)?;
        }

        validate_path(
            "upload_dir",
            &self.upload_dir.to_string_lossy(),
        )?;
        validate_positive_number("max_body_bytes", self.max_body_bytes, 1024)?;

        validate_non_empty_string("project_id", &self.project_id)?;
        validate_gcs_bucket_name("bucket_name", &self.bucket_name)?;
        validate_url("storage.endpoint", &self.storage_endpoint)?;

        validate_non_empty_string("document_ai.processor_id", &self.document_ai.processor_id)?;
        validate_url("document_ai.endpoint", &self.document_ai.endpoint)?;

        validate_non_empty_string("gemini.model", &self.chat.model)?;
        validate_url("gemini.endpoint", &self.chat.endpoint)?;
        validate_non_empty_string("precedents.model", &self.precedents.model)?;
        validate_url("precedents.endpoint", &self.precedents.endpoint)?;

        validate_url("google.metadata_endpoint", &self.auth.metadata_endpoint)?;
        if let Some(endpoint) = &self.glossary_endpoint {
            validate_url("glossary.endpoint", endpoint)?;
        }

        validate_range(
            "google.request_timeout_seconds",
            self.request_timeout_seconds,
            1,
            600,
        )?;

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "http://127.0.0.1:3000"]
        );
        assert_eq!(config.chat.endpoint, "https://aiplatform.googleapis.com");
        assert_eq!(
            config.precedents.endpoint,
            "https://us-central1-aiplatform.googleapis.com"
        );
        assert_eq!(
            config.document_ai.endpoint,
            "https://us-documentai.googleapis.com"
        );
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FRONTEND_ORIGIN", "https://app.example.com"),
            ("BUCKET_NAME", "other-bucket"),
            ("PROJECT_ID", "proj-1"),
            ("MCP_NAME", ""),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(
            config.allowed_origins,
            vec!["https://app.example.com", "http://127.0.0.1:3000"]
        );
        assert_eq!(config.bucket_name, "other-bucket");
        assert_eq!(config.project_id, "proj-1");
        // 空字串不覆寫
        assert_eq!(config.mcp_name, DEFAULT_MCP_NAME);
    }

    #[test]
    fn test_toml_then_cli_precedence() {
        let file = TomlConfig::from_toml_str(
            r#"
[server]
host = "127.0.0.1"
port = 9000

[gemini]
location = "asia-south1"

[document_ai]
location = "eu"
endpoint = "http://localhost:5555"
"#,
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.apply_toml(&file);

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(
            config.chat.endpoint,
            "https://asia-south1-aiplatform.googleapis.com"
        );
        assert_eq!(config.document_ai.location, "eu");
        assert_eq!(config.document_ai.endpoint, "http://localhost:5555");

        let cli = CliConfig {
            port: Some(7000),
            ..Default::default()
        };
        let loaded = AppConfig::load(&cli).unwrap();
        assert_eq!(loaded.port, 7000);
    }

    #[test]
    fn test_invalid_bucket_fails_validation() {
        let config = AppConfig {
            bucket_name: "Bad Bucket".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
