// src/store/json.rs

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use crate::{
    error::AppError,
    models::progress::{AnswerRecord, ProgressUpdate, UserProgress},
    store::QuizStore,
};

/// On-disk layout: one JSON document holding every namespace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub users: BTreeMap<String, UserProgress>,

    /// user id -> question index -> answer
    #[serde(default)]
    pub answers: BTreeMap<String, BTreeMap<usize, StoredAnswer>>,

    #[serde(default)]
    pub meta: StoreMeta,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreMeta {
    #[serde(default, rename = "activeStartMessages")]
    pub active_start_messages: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAnswer {
    pub option_key: String,
    pub created_at: DateTime<Utc>,
}

/// Flat-file store.
///
/// The document lives in memory behind a single mutex, so every write is a
/// serialized read-modify-write. Each mutation is applied to a copy, written
/// atomically (temp file + rename) and only then committed in memory.
pub struct JsonStore {
    path: PathBuf,
    doc: Mutex<StoreDocument>,
}

impl JsonStore {
    /// Opens the store. A missing or unreadable file yields an empty document.
    pub async fn open(path: &Path) -> Self {
        let doc = match tokio::fs::read(path).await {
            Ok(bytes) => match serde_json::from_slice::<StoreDocument>(&bytes) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(
                        "Store file {} is corrupt, starting empty: {}",
                        path.display(),
                        e
                    );
                    StoreDocument::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => {
                tracing::warn!(
                    "Failed to read store file {}, starting empty: {}",
                    path.display(),
                    e
                );
                StoreDocument::default()
            }
        };

        Self {
            path: path.to_path_buf(),
            doc: Mutex::new(doc),
        }
    }

    /// Applies `change` to a copy of the document, persists it, then commits.
    async fn mutate<T: Send>(
        &self,
        change: impl FnOnce(&mut StoreDocument) -> T + Send,
    ) -> Result<T, AppError> {
        let mut guard = self.doc.lock().await;
        let mut next = guard.clone();
        let out = change(&mut next);

        let bytes = serde_json::to_vec_pretty(&next)
            .map_err(|e| AppError::StoreError(e.to_string()))?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || atomic_write(&path, &bytes))
            .await
            .map_err(|e| AppError::StoreError(e.to_string()))??;

        *guard = next;
        Ok(out)
    }
}

/// Writes through a temp file in the same directory so readers never see a partial document.
fn atomic_write(path: &Path, data: &[u8]) -> Result<(), AppError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| AppError::StoreError(e.error.to_string()))?;
    Ok(())
}

#[async_trait]
impl QuizStore for JsonStore {
    async fn get_user_progress(&self, user_id: &str) -> Result<Option<UserProgress>, AppError> {
        Ok(self.doc.lock().await.users.get(user_id).cloned())
    }

    async fn upsert_user_progress(
        &self,
        user_id: &str,
        update: ProgressUpdate,
    ) -> Result<UserProgress, AppError> {
        self.mutate(|doc| {
            let record = doc
                .users
                .entry(user_id.to_string())
                .or_insert_with(|| UserProgress::new(user_id));
            record.merge(update);
            record.clone()
        })
        .await
    }

    async fn save_answer(&self, user_id: &str, answer: &AnswerRecord) -> Result<(), AppError> {
        self.mutate(|doc| {
            doc.answers.entry(user_id.to_string()).or_default().insert(
                answer.question_index,
                StoredAnswer {
                    option_key: answer.option_key.clone(),
                    created_at: answer.created_at,
                },
            );
        })
        .await
    }

    async fn get_answers(&self, user_id: &str) -> Result<Vec<AnswerRecord>, AppError> {
        let doc = self.doc.lock().await;
        // BTreeMap iteration is already ascending by index.
        Ok(doc
            .answers
            .get(user_id)
            .map(|answers| {
                answers
                    .iter()
                    .map(|(index, a)| AnswerRecord {
                        question_index: *index,
                        option_key: a.option_key.clone(),
                        created_at: a.created_at,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get_active_start_pointer(&self, channel_id: &str) -> Result<Option<String>, AppError> {
        Ok(self
            .doc
            .lock()
            .await
            .meta
            .active_start_messages
            .get(channel_id)
            .cloned())
    }

    async fn set_active_start_pointer(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), AppError> {
        self.mutate(|doc| {
            doc.meta
                .active_start_messages
                .insert(channel_id.to_string(), message_id.to_string());
        })
        .await
    }

    async fn clear_user_data(&self, user_id: &str) -> Result<(), AppError> {
        {
            let doc = self.doc.lock().await;
            if !doc.users.contains_key(user_id) && !doc.answers.contains_key(user_id) {
                return Ok(());
            }
        }
        self.mutate(|doc| {
            doc.users.remove(user_id);
            doc.answers.remove(user_id);
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, minute, 0).unwrap()
    }

    fn answer(index: usize, key: &str) -> AnswerRecord {
        AnswerRecord {
            question_index: index,
            option_key: key.to_string(),
            created_at: at(index as u32),
        }
    }

    #[tokio::test]
    async fn test_save_answer_overwrites_same_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("store.json")).await;

        store.save_answer("u", &answer(0, "A")).await.unwrap();
        store.save_answer("u", &answer(0, "B")).await.unwrap();

        let answers = store.get_answers("u").await.unwrap();
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].option_key, "B");
    }

    #[tokio::test]
    async fn test_answers_sorted_numerically() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("store.json")).await;

        for index in [10, 2, 0, 1] {
            store.save_answer("u", &answer(index, "A")).await.unwrap();
        }

        let indexes: Vec<usize> = store
            .get_answers("u")
            .await
            .unwrap()
            .iter()
            .map(|a| a.question_index)
            .collect();
        assert_eq!(indexes, vec![0, 1, 2, 10]);
    }

    #[tokio::test]
    async fn test_clear_user_data_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(&dir.path().join("store.json")).await;

        store
            .upsert_user_progress("u", ProgressUpdate::started(at(0)))
            .await
            .unwrap();
        store.save_answer("u", &answer(0, "A")).await.unwrap();

        store.clear_user_data("u").await.unwrap();
        store.clear_user_data("u").await.unwrap();

        assert!(store.get_answers("u").await.unwrap().is_empty());
        assert!(store.get_user_progress("u").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_document_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        {
            let store = JsonStore::open(&path).await;
            store
                .upsert_user_progress("u", ProgressUpdate::started(at(1)))
                .await
                .unwrap();
            store.save_answer("u", &answer(3, "C")).await.unwrap();
            store.set_active_start_pointer("chan", "m1").await.unwrap();
        }

        let reopened = JsonStore::open(&path).await;
        let progress = reopened.get_user_progress("u").await.unwrap().unwrap();
        assert_eq!(progress.started_at, Some(at(1)));
        assert_eq!(reopened.get_answers("u").await.unwrap()[0].option_key, "C");
        assert_eq!(
            reopened.get_active_start_pointer("chan").await.unwrap().as_deref(),
            Some("m1")
        );

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["meta"]["activeStartMessages"]["chan"], "m1");
        assert_eq!(raw["answers"]["u"]["3"]["option_key"], "C");
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = JsonStore::open(&path).await;
        assert!(store.get_user_progress("u").await.unwrap().is_none());
        assert!(store.get_active_start_pointer("c").await.unwrap().is_none());

        // The next write replaces the corrupt document wholesale.
        store.set_active_start_pointer("c", "m").await.unwrap();
        let reopened = JsonStore::open(&path).await;
        assert_eq!(
            reopened.get_active_start_pointer("c").await.unwrap().as_deref(),
            Some("m")
        );
    }

    #[tokio::test]
    async fn test_concurrent_upserts_keep_both_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(JsonStore::open(&dir.path().join("store.json")).await);

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                let update = ProgressUpdate {
                    started_at: Some(at(0)),
                    ..ProgressUpdate::default()
                };
                store.upsert_user_progress("u", update).await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .upsert_user_progress(
                        "u",
                        ProgressUpdate::completed(
                            at(5),
                            Some("cat".to_string()),
                            Default::default(),
                        ),
                    )
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let progress = store.get_user_progress("u").await.unwrap().unwrap();
        assert_eq!(progress.started_at, Some(at(0)));
        assert_eq!(progress.completed_at, Some(at(5)));
    }
}
