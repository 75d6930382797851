pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod mcp;
pub mod server;
pub mod utils;

pub use adapters::local::LocalStorage;
pub use config::{AppConfig, CliConfig};
pub use core::tools::LegalTools;
pub use mcp::McpServer;
pub use server::{serve, AppState};
pub use utils::error::{Result, ServerError};
