// src/store/mod.rs

pub mod json;
pub mod sql;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    config::Config,
    error::AppError,
    models::progress::{AnswerRecord, ProgressUpdate, UserProgress},
};

pub use json::JsonStore;
pub use sql::SqlStore;

/// Persistence for user progress, answers and active start prompts.
///
/// Implementations serialize writes so concurrent read-modify-write cycles
/// cannot drop each other's fields.
#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn get_user_progress(&self, user_id: &str) -> Result<Option<UserProgress>, AppError>;

    /// Merges `update` over the existing record (creating it if absent) and returns the result.
    async fn upsert_user_progress(
        &self,
        user_id: &str,
        update: ProgressUpdate,
    ) -> Result<UserProgress, AppError>;

    /// Overwrites whatever answer was stored at the same question index.
    async fn save_answer(&self, user_id: &str, answer: &AnswerRecord) -> Result<(), AppError>;

    /// All answers for the user, ascending by question index.
    async fn get_answers(&self, user_id: &str) -> Result<Vec<AnswerRecord>, AppError>;

    async fn get_active_start_pointer(&self, channel_id: &str) -> Result<Option<String>, AppError>;

    async fn set_active_start_pointer(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), AppError>;

    /// Deletes progress and answers. No-op for unknown users.
    async fn clear_user_data(&self, user_id: &str) -> Result<(), AppError>;
}

/// Picks the SQLite backend when `DATABASE_URL` is set, otherwise the JSON document.
pub async fn open_store(config: &Config) -> Result<Arc<dyn QuizStore>, AppError> {
    match &config.database_url {
        Some(url) => {
            tracing::info!("Using SQLite store at {}", url);
            Ok(Arc::new(SqlStore::connect(url).await?))
        }
        None => {
            tracing::info!("Using JSON store at {}", config.store_path.display());
            Ok(Arc::new(JsonStore::open(&config.store_path).await))
        }
    }
}
