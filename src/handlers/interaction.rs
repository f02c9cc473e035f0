// src/handlers/interaction.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{
    error::AppError,
    models::event::{InteractionEvent, MemberEvent, RenderInstruction},
    services::engine::QuizEngine,
    utils::jwt::Claims,
};

/// Runs one quiz interaction and returns what the relay should render.
///
/// Always 200: failures inside the transition come back as a
/// `temporary_issue` instruction rather than an HTTP error, and a body that
/// does not parse (e.g. a negative question index) as `invalid_input`.
pub async fn handle_interaction(
    State(engine): State<Arc<QuizEngine>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<InteractionEvent>, JsonRejection>,
) -> Json<RenderInstruction> {
    let event = match payload {
        Ok(Json(event)) => event,
        Err(rejection) => {
            tracing::warn!(
                "[{}] Rejected malformed interaction: {}",
                claims.sub,
                rejection.body_text()
            );
            return Json(RenderInstruction::malformed_interaction());
        }
    };

    tracing::debug!(
        "[{}] {} interaction from {}",
        claims.sub,
        event.kind(),
        event.user_id()
    );
    Json(engine.handle(event).await)
}

/// Member joined the guild: reset their quiz and optionally post a welcome prompt.
pub async fn member_joined(
    State(engine): State<Arc<QuizEngine>>,
    Json(event): Json<MemberEvent>,
) -> Result<impl IntoResponse, AppError> {
    require_user_id(&event.user_id)?;
    let welcome_message_id = engine.member_joined(&event.user_id).await?;
    Ok(Json(serde_json::json!({
        "user_id": event.user_id,
        "cleared": true,
        "welcome_message_id": welcome_message_id,
    })))
}

/// Member left the guild: reset their quiz so a rejoin starts fresh.
pub async fn member_left(
    State(engine): State<Arc<QuizEngine>>,
    Json(event): Json<MemberEvent>,
) -> Result<impl IntoResponse, AppError> {
    require_user_id(&event.user_id)?;
    engine.member_left(&event.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Returns the channel's active start prompt id.
pub async fn get_start_prompt(
    State(engine): State<Arc<QuizEngine>>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let message_id = engine
        .active_start_prompt(&channel_id)
        .await?
        .ok_or(AppError::NotFound("No active start prompt".to_string()))?;

    Ok(Json(serde_json::json!({
        "channel_id": channel_id,
        "message_id": message_id,
    })))
}

fn require_user_id(user_id: &str) -> Result<(), AppError> {
    if user_id.trim().is_empty() {
        return Err(AppError::BadRequest("user_id is required".to_string()));
    }
    Ok(())
}
