use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::proxy::handlers;
use crate::proxy::health;
use crate::proxy::middleware::{client_auth_middleware, session_auth_middleware};
use crate::proxy::state::AppState;

pub fn build_routes(state: AppState) -> Router {
    let translation_routes = Router::new()
        .route("/v1/messages", post(handlers::claude::handle_messages))
        .layer(from_fn_with_state(state.clone(), client_auth_middleware));

    let admin_routes = Router::new()
        .route(
            "/api/config",
            get(handlers::admin::handle_get_config).post(handlers::admin::handle_put_config),
        )
        .route(
            "/api/test-connection",
            post(handlers::admin::handle_test_connection),
        )
        .route(
            "/api/generate-key",
            post(handlers::admin::handle_generate_key),
        )
        .route(
            "/api/change-password",
            post(handlers::admin::handle_change_password),
        )
        .layer(from_fn_with_state(state.clone(), session_auth_middleware));

    let public_routes = Router::new()
        .route("/", get(handlers::admin::handle_index))
        .route("/health", get(health::health_check_handler))
        .route("/api/stats", get(health::stats_handler))
        .route("/api/login", post(handlers::admin::handle_login));

    Router::new()
        .merge(translation_routes)
        .merge(admin_routes)
        .merge(public_routes)
        .with_state(state)
}
