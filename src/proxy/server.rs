use axum::extract::DefaultBodyLimit;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::proxy::routes;
use crate::proxy::state::AppState;

pub struct AxumStartConfig {
    pub port: u16,
    pub body_limit_bytes: usize,
}

// Serves until stop() or process shutdown. Binding failures surface to the
// caller so startup can exit non-zero.
pub struct AxumServer {
    shutdown: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
    pub local_addr: std::net::SocketAddr,
}

impl AxumServer {
    pub async fn start(state: AppState, config: AxumStartConfig) -> AppResult<Self> {
        let router = routes::build_routes(state)
            .layer(CorsLayer::permissive())
            // Oversized bodies are rejected with 413 before translation.
            .layer(DefaultBodyLimit::max(config.body_limit_bytes));

        let addr = format!("0.0.0.0:{}", config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Config(format!("failed to bind {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::Config(format!("failed to read bound address: {}", e)))?;

        let shutdown = CancellationToken::new();
        let server_shutdown = shutdown.clone();
        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    server_shutdown.cancelled().await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!("Server terminated abnormally: {}", e);
            }
        });

        info!("Gateway listening on {}", local_addr);
        Ok(Self {
            shutdown,
            handle,
            local_addr,
        })
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = self.handle.await;
    }
}
