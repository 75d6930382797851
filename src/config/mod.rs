pub mod app_config;
pub mod toml_config;

pub use app_config::{AppConfig, AuthSettings, DocumentAiSettings, GeminiSettings};

use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, Parser)]
#[command(name = "legal-mcp")]
#[command(about = "LegalDemystifier backend: MCP tools for legal documents")]
pub struct CliConfig {
    /// Optional TOML configuration file
    #[arg(short, long, env = "LEGAL_MCP_CONFIG")]
    pub config: Option<String>,

    #[arg(long, env = "LEGAL_MCP_HOST")]
    pub host: Option<String>,

    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, env = "LOG_JSON", help = "Emit JSON log lines")]
    pub json_logs: bool,
}
