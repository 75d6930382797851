use clap::Parser;
use legal_mcp::utils::{logger, validation::Validate};
use legal_mcp::{app, server, AppConfig, CliConfig};
use std::sync::Arc;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();

    // 初始化日誌
    if cli.json_logs {
        logger::init_json_logger(cli.verbose);
    } else {
        logger::init_cli_logger(cli.verbose);
    }

    tracing::info!("Starting legal-mcp v{}", env!("CARGO_PKG_VERSION"));
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 載入並驗證配置
    let config = match AppConfig::load(&cli).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(
                "❌ Configuration failed: {} (Category: {:?})",
                e,
                e.category()
            );
            eprintln!("❌ {}", e);
            std::process::exit(e.exit_code());
        }
    };

    let state = match app::build_state(&config) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            tracing::error!("❌ Startup failed: {} (Category: {:?})", e, e.category());
            eprintln!("❌ {}", e);
            std::process::exit(e.exit_code());
        }
    };

    tracing::info!("🌐 CORS allowed origins: {:?}", config.allowed_origins);
    tracing::info!("📁 Upload directory: {}", config.upload_dir.display());

    let address = config.bind_address();
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(
        "🚀 {} listening on http://{} (MCP endpoint: /mcp)",
        config.mcp_name,
        listener.local_addr()?
    );

    server::serve(listener, state, server::shutdown_signal()).await?;

    tracing::info!("👋 Server stopped");
    Ok(())
}
