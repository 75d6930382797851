// Server layer: hyper HTTP/1 accept loop, routing and CORS

pub mod cors;
pub mod routes;

use crate::mcp::handler::McpServer;
use crate::utils::error::Result;
use cors::CorsPolicy;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use hyper_util::server::graceful::GracefulShutdown;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// In-flight connections get this long to finish after shutdown starts.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

pub struct AppState {
    pub mcp: McpServer,
    pub cors: CorsPolicy,
    pub max_body_bytes: usize,
}

/// Accepts connections until `shutdown` resolves, then drains open connections.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    let graceful = GracefulShutdown::new();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("⚠️ 接受連線失敗: {}", e);
                        continue;
                    }
                };
                tracing::debug!("新連線: {}", peer);

                let state = Arc::clone(&state);
                let service = service_fn(move |request| {
                    let state = Arc::clone(&state);
                    async move { Ok::<_, Infallible>(routes::handle(state, request).await) }
                });

                let connection = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service);
                let connection = graceful.watch(connection);

                tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::debug!("連線 {} 結束時發生錯誤: {}", peer, e);
                    }
                });
            }
            _ = &mut shutdown => {
                tracing::info!("🛑 收到關閉訊號，停止接受新連線");
                break;
            }
        }
    }

    drop(listener);
    tokio::select! {
        _ = graceful.shutdown() => tracing::info!("✅ 所有連線已關閉"),
        _ = tokio::time::sleep(SHUTDOWN_GRACE) => {
            tracing::warn!("⏱️ 等待連線關閉逾時 ({}s)，強制結束", SHUTDOWN_GRACE.as_secs())
        }
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("無法監聽 Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("無法監聽 SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
