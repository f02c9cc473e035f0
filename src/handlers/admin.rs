// src/handlers/admin.rs

use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use crate::{error::AppError, services::engine::QuizEngine, utils::jwt::Claims};

/// Clears a user's stored quiz data and restores their intake channel access.
/// Admin only.
pub async fn reset_user(
    State(engine): State<Arc<QuizEngine>>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("{} requested quiz reset for {}", claims.sub, user_id);
    let outcome = engine.admin_reset(&user_id).await.map_err(|e| {
        tracing::error!("Failed to reset {}: {:?}", user_id, e);
        e
    })?;
    Ok(Json(outcome))
}

/// Shows stored progress and answers for a user.
/// Admin only.
pub async fn get_progress(
    State(engine): State<Arc<QuizEngine>>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let report = engine.progress_report(&user_id).await?;
    Ok(Json(report))
}

/// Posts a new start prompt in the channel and retires the old one.
/// Admin only.
pub async fn post_start_prompt(
    State(engine): State<Arc<QuizEngine>>,
    Path(channel_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let message_id = engine.publish_start_prompt(&channel_id, None).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "channel_id": channel_id,
            "message_id": message_id,
        })),
    ))
}
