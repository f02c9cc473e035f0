// src/store/sql.rs

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

use crate::{
    error::AppError,
    models::progress::{AnswerRecord, ProgressUpdate, Tally, UserProgress},
    store::QuizStore,
};

#[derive(sqlx::FromRow)]
struct ProgressRow {
    user_id: String,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    top_category_id: Option<String>,
    tally_json: Option<String>,
}

impl ProgressRow {
    fn into_progress(self) -> Result<UserProgress, AppError> {
        let tally = self
            .tally_json
            .map(|raw| serde_json::from_str::<Tally>(&raw))
            .transpose()
            .map_err(|e| AppError::StoreError(e.to_string()))?;
        Ok(UserProgress {
            user_id: self.user_id,
            started_at: self.started_at,
            completed_at: self.completed_at,
            top_category_id: self.top_category_id,
            tally,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    question_index: i64,
    option_key: String,
    created_at: DateTime<Utc>,
}

/// SQLite-backed store. Upserts merge in a single statement, so there is no
/// read-modify-write window to race in.
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // Each in-memory connection is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    /// Wraps an existing pool and applies migrations.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, AppError> {
        tracing::info!("Running migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl QuizStore for SqlStore {
    async fn get_user_progress(&self, user_id: &str) -> Result<Option<UserProgress>, AppError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT user_id, started_at, completed_at, top_category_id, tally_json
            FROM user_progress
            WHERE user_id = ?
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(ProgressRow::into_progress).transpose()
    }

    async fn upsert_user_progress(
        &self,
        user_id: &str,
        update: ProgressUpdate,
    ) -> Result<UserProgress, AppError> {
        let tally_json = update
            .tally
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| AppError::StoreError(e.to_string()))?;

        // COALESCE keeps existing values for fields the update leaves out.
        // ?6 makes the completion fields take the update's values verbatim.
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            INSERT INTO user_progress (user_id, started_at, completed_at, top_category_id, tally_json)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id) DO UPDATE SET
                started_at = COALESCE(excluded.started_at, user_progress.started_at),
                completed_at = CASE WHEN ?6 THEN excluded.completed_at
                    ELSE COALESCE(excluded.completed_at, user_progress.completed_at) END,
                top_category_id = CASE WHEN ?6 THEN excluded.top_category_id
                    ELSE COALESCE(excluded.top_category_id, user_progress.top_category_id) END,
                tally_json = CASE WHEN ?6 THEN excluded.tally_json
                    ELSE COALESCE(excluded.tally_json, user_progress.tally_json) END
            RETURNING user_id, started_at, completed_at, top_category_id, tally_json
            "#,
        )
        .bind(user_id)
        .bind(update.started_at)
        .bind(update.completed_at)
        .bind(update.top_category_id)
        .bind(tally_json)
        .bind(update.replace_outcome)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert progress for {}: {:?}", user_id, e);
            AppError::StoreError(e.to_string())
        })?;

        row.into_progress()
    }

    async fn save_answer(&self, user_id: &str, answer: &AnswerRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO answers (user_id, question_index, option_key, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, question_index) DO UPDATE SET
                option_key = excluded.option_key,
                created_at = excluded.created_at
            "#,
        )
        .bind(user_id)
        .bind(answer.question_index as i64)
        .bind(&answer.option_key)
        .bind(answer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_answers(&self, user_id: &str) -> Result<Vec<AnswerRecord>, AppError> {
        let rows = sqlx::query_as::<_, AnswerRow>(
            r#"
            SELECT question_index, option_key, created_at
            FROM answers
            WHERE user_id = ?
            ORDER BY question_index ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| AnswerRecord {
                question_index: r.question_index.max(0) as usize,
                option_key: r.option_key,
                created_at: r.created_at,
            })
            .collect())
    }

    async fn get_active_start_pointer(&self, channel_id: &str) -> Result<Option<String>, AppError> {
        let message_id: Option<String> = sqlx::query_scalar(
            "SELECT message_id FROM active_start_messages WHERE channel_id = ?",
        )
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(message_id)
    }

    async fn set_active_start_pointer(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO active_start_messages (channel_id, message_id)
            VALUES (?, ?)
            ON CONFLICT(channel_id) DO UPDATE SET message_id = excluded.message_id
            "#,
        )
        .bind(channel_id)
        .bind(message_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_user_data(&self, user_id: &str) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM answers WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM user_progress WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
