// src/handlers/health.rs

use axum::{Json, extract::State, response::IntoResponse};

use crate::state::AppState;

pub async fn ping() -> &'static str {
    "pong"
}

/// Uptime and whether the quiz is configured.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let content = state.engine.content();
    Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "questions": content.definition.questions.len(),
        "categories": content.categories.len(),
        "configured": content.definition.is_configured(),
    }))
}
