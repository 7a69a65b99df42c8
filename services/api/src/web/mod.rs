pub mod account;
pub mod auth;
pub mod enhance;
pub mod middleware;
pub mod rest;
pub mod state;

pub use middleware::require_auth;

use axum::{
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use state::AppState;

/// Builds the API router. CORS and the Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/logout", post(auth::logout_handler))
        .route("/enhance/techniques", get(enhance::techniques_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/view", get(account::get_view_handler).put(account::set_view_handler))
        .route("/enhance/upload", post(enhance::upload_handler))
        .route("/enhance/apply", post(enhance::apply_handler))
        .route("/enhance/original", get(enhance::original_preview_handler))
        .route("/enhance/enhanced", get(enhance::enhanced_preview_handler))
        .route("/enhance/download", get(enhance::download_handler))
        .route("/profile", get(account::profile_handler))
        .route("/analytics", get(account::analytics_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(app_state.config.max_upload_bytes))
        .with_state(app_state)
}
