// src/routes.rs

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::{
    handlers::{admin, health, interaction},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Relay routes (interactions, member events, start-prompt lookup) need a relay or admin token.
/// * Admin routes additionally need the admin role.
/// * Health routes are open.
pub fn create_router(state: AppState) -> Router {
    let relay_routes = Router::new()
        .route("/interactions", post(interaction::handle_interaction))
        .route("/members/joined", post(interaction::member_joined))
        .route("/members/left", post(interaction::member_left))
        .route(
            "/channels/{channel_id}/start-prompt",
            get(interaction::get_start_prompt),
        )
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let admin_routes = Router::new()
        .route("/users/{user_id}/reset", post(admin::reset_user))
        .route("/users/{user_id}/progress", get(admin::get_progress))
        .route(
            "/channels/{channel_id}/start-prompt",
            post(admin::post_start_prompt),
        )
        // Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/ping", get(health::ping));

    Router::new()
        .nest("/api", relay_routes.merge(health_routes))
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
