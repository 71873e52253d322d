pub mod constants;
pub mod error;
mod models;
mod modules;
mod proxy;
#[cfg(test)]
mod test_utils;

use modules::system::logger;
use tracing::{error, info, warn};

fn apply_env_overrides(config: &mut models::GatewayConfig) {
    if let Ok(port) = std::env::var("PORT") {
        let trimmed = port.trim();
        if !trimmed.is_empty() {
            match trimmed.parse::<u16>() {
                Ok(p) if p > 0 => {
                    config.port = p;
                    info!("Using listening port from environment: {}", p);
                }
                _ => warn!("[W-PORT-INVALID] ignoring_invalid_port_value: {}", port),
            }
        }
    }

    if let Ok(password) = std::env::var("ADMIN_PASSWORD") {
        if !password.trim().is_empty() {
            info!("Using admin bootstrap password from environment");
            config.admin_secret = password;
        }
    }

    if let Ok(base_url) = std::env::var("UPSTREAM_BASE_URL") {
        if !base_url.trim().is_empty() {
            info!("Using upstream base URL from environment");
            config.upstream_base_url = base_url.trim().to_string();
        }
    }

    if let Ok(key) = std::env::var("UPSTREAM_API_KEY") {
        if !key.trim().is_empty() {
            info!("Using upstream API key from environment");
            config.upstream_api_key = key;
        }
    }

    if let Ok(model) = std::env::var("DEFAULT_MODEL") {
        if !model.trim().is_empty() {
            info!("Using default model from environment: {}", model.trim());
            config.default_model = model.trim().to_string();
        }
    }

    if let Ok(limit) = std::env::var("BODY_LIMIT_BYTES") {
        let trimmed = limit.trim();
        if !trimmed.is_empty() {
            match trimmed.parse::<usize>() {
                Ok(bytes) if bytes > 0 => {
                    config.body_limit_bytes = bytes;
                    info!("Using request body limit from environment: {} bytes", bytes);
                }
                _ => warn!(
                    "[W-BODY-LIMIT-INVALID] ignoring_invalid_body_limit_value: {}",
                    limit
                ),
            }
        }
    }
}

async fn start_runtime() -> Result<proxy::AxumServer, String> {
    let mut config = modules::system::config::load_gateway_config()
        .map_err(|e| format!("failed_to_load_config: {}", e))?;

    apply_env_overrides(&mut config);
    modules::system::validation::validate_gateway_config(&config).map_err(|errors| {
        format!(
            "configuration_validation_failed:\n{}",
            errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("\n")
        )
    })?;

    let port = config.port;
    let body_limit_bytes = config.body_limit_bytes;
    let state = proxy::AppState::new(config);

    proxy::monitor::spawn_stats_logger(state.core.monitor.clone());

    info!("Starting gateway on port {}", port);
    proxy::AxumServer::start(
        state,
        proxy::AxumStartConfig {
            port,
            body_limit_bytes,
        },
    )
    .await
    .map_err(|e| format!("failed_to_start_gateway: {}", e))
}

pub fn run() {
    logger::init_logger();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    runtime.block_on(async {
        let server = match start_runtime().await {
            Ok(server) => server,
            Err(e) => {
                error!("[E-RUNTIME-STARTUP] {}", e);
                std::process::exit(1);
            }
        };

        info!("Gateway is running. Press Ctrl+C to exit.");
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutting down gateway");
        server.stop().await;
    });
}
