use crate::utils::error::{Result, ServerError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 設定檔結構，所有區段與欄位皆可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    pub server: Option<ServerSection>,
    pub cors: Option<CorsSection>,
    pub google: Option<GoogleSection>,
    pub storage: Option<StorageSection>,
    pub document_ai: Option<DocumentAiSection>,
    pub gemini: Option<GeminiSection>,
    pub precedents: Option<GeminiSection>,
    pub glossary: Option<GlossarySection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub mcp_name: Option<String>,
    pub upload_dir: Option<String>,
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorsSection {
    pub frontend_origin: Option<String>,
    pub extra_origins: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoogleSection {
    pub project_id: Option<String>,
    pub access_token: Option<String>,
    pub metadata_endpoint: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSection {
    pub bucket_name: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentAiSection {
    pub location: Option<String>,
    pub processor_id: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeminiSection {
    pub model: Option<String>,
    pub location: Option<String>,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlossarySection {
    pub endpoint: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(ServerError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        // 處理環境變數替換
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| ServerError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${PROJECT_ID})，未定義的變數保留原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ServerError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_partial_toml_config() {
        let toml_content = r#"
[server]
port = 9090
mcp_name = "TestMCP"

[storage]
bucket_name = "contracts-bucket"

[precedents]
location = "europe-west4"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();

        let server = config.server.unwrap();
        assert_eq!(server.port, Some(9090));
        assert_eq!(server.mcp_name.as_deref(), Some("TestMCP"));
        assert!(server.host.is_none());
        assert_eq!(
            config.storage.unwrap().bucket_name.as_deref(),
            Some("contracts-bucket")
        );
        assert_eq!(
            config.precedents.unwrap().location.as_deref(),
            Some("europe-west4")
        );
        assert!(config.document_ai.is_none());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("LEGAL_MCP_TEST_PROJECT", "demo-project-42");

        let toml_content = r#"
[google]
project_id = "${LEGAL_MCP_TEST_PROJECT}"
access_token = "${LEGAL_MCP_TEST_UNSET_TOKEN}"
"#;

        let config = TomlConfig::from_toml_str(toml_content).unwrap();
        let google = config.google.unwrap();
        assert_eq!(google.project_id.as_deref(), Some("demo-project-42"));
        assert_eq!(
            google.access_token.as_deref(),
            Some("${LEGAL_MCP_TEST_UNSET_TOKEN}")
        );

        std::env::remove_var("LEGAL_MCP_TEST_PROJECT");
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let err = TomlConfig::from_toml_str("[database]\nurl = \"postgres://localhost\"\n").unwrap_err();
        assert!(matches!(err, ServerError::ConfigValidationError { .. }));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[document_ai]\nprocessor_id = \"abc123\"\n")
            .unwrap();

        let config = TomlConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(
            config.document_ai.unwrap().processor_id.as_deref(),
            Some("abc123")
        );
    }
}
