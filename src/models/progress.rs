// src/models/progress.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Category id to number of answers that resolved to it.
pub type Tally = BTreeMap<String, u32>;

/// Where a user stands in the quiz, derived from their progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizState {
    NotStarted,
    InProgress,
    Completed,
}

/// Per-user progress record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProgress {
    pub user_id: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub top_category_id: Option<String>,
    /// Snapshot of the tally taken at completion.
    #[serde(default)]
    pub tally: Option<Tally>,
}

impl UserProgress {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            started_at: None,
            completed_at: None,
            top_category_id: None,
            tally: None,
        }
    }

    /// Overlays the supplied fields; anything left `None` in `update` is kept,
    /// unless `replace_outcome` is set, which overwrites the completion fields
    /// with whatever the update carries.
    pub fn merge(&mut self, update: ProgressUpdate) {
        if update.replace_outcome {
            self.completed_at = None;
            self.top_category_id = None;
            self.tally = None;
        }
        if update.started_at.is_some() {
            self.started_at = update.started_at;
        }
        if update.completed_at.is_some() {
            self.completed_at = update.completed_at;
        }
        if update.top_category_id.is_some() {
            self.top_category_id = update.top_category_id;
        }
        if update.tally.is_some() {
            self.tally = update.tally;
        }
    }

    pub fn state(&self) -> QuizState {
        match (self.started_at, self.completed_at) {
            (_, Some(_)) => QuizState::Completed,
            (Some(_), None) => QuizState::InProgress,
            (None, None) => QuizState::NotStarted,
        }
    }
}

/// Partial progress fields for an upsert.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressUpdate {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub top_category_id: Option<String>,
    pub tally: Option<Tally>,
    /// `completed_at`, `top_category_id` and `tally` are written as given,
    /// `None` included.
    pub replace_outcome: bool,
}

impl ProgressUpdate {
    /// A (re)start. Drops the outcome of any earlier run.
    pub fn started(at: DateTime<Utc>) -> Self {
        Self {
            started_at: Some(at),
            replace_outcome: true,
            ..Self::default()
        }
    }

    /// Completion. A run that scored no category clears the previous winner.
    pub fn completed(at: DateTime<Utc>, top_category_id: Option<String>, tally: Tally) -> Self {
        Self {
            completed_at: Some(at),
            top_category_id,
            tally: Some(tally),
            replace_outcome: true,
            ..Self::default()
        }
    }
}

/// One stored answer. At most one exists per (user, question index).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub question_index: usize,
    pub option_key: String,
    pub created_at: DateTime<Utc>,
}

/// Admin view of a user's stored data.
#[derive(Debug, Serialize)]
pub struct ProgressReport {
    pub user_id: String,
    pub state: QuizState,
    pub progress: Option<UserProgress>,
    pub answers: Vec<AnswerRecord>,
}
