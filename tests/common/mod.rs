// tests/common/mod.rs
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::Notify;
use quiz_bot::{
    config::Config,
    error::AppError,
    models::{
        progress::{AnswerRecord, ProgressUpdate, UserProgress},
        quiz::{OutcomeCategory, Question, QuizContent, QuizDefinition, QuizOption},
    },
    platform::{ChatPlatform, StartPrompt},
    services::engine::{EngineSettings, QuizEngine},
    store::QuizStore,
    utils::clock::ManualClock,
};

/// In-memory chat platform that records every call.
#[derive(Default)]
pub struct FakePlatform {
    pub roles: Mutex<HashMap<String, HashSet<String>>>,
    pub calls: Mutex<Vec<String>>,
    pub alerts: Mutex<Vec<String>>,
    pub fail_role_lookup: AtomicBool,
    pub fail_add_role: AtomicBool,
    pub fail_remove_role: AtomicBool,
    /// Returned by the channel-history scan for start prompts.
    pub latest_prompt: Mutex<Option<String>>,
    /// When set, `add_role` signals `add_role_entered` and waits for `add_role_release`.
    pub hold_add_role: AtomicBool,
    pub add_role_entered: Notify,
    pub add_role_release: Notify,
    next_message: AtomicU64,
}

impl FakePlatform {
    pub fn grant(&self, user_id: &str, role_id: &str) {
        self.roles
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .insert(role_id.to_string());
    }

    pub fn holds(&self, user_id: &str, role_id: &str) -> bool {
        self.roles
            .lock()
            .unwrap()
            .get(user_id)
            .is_some_and(|r| r.contains(role_id))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn member_role_ids(&self, user_id: &str) -> Result<Option<Vec<String>>, AppError> {
        if self.fail_role_lookup.load(Ordering::SeqCst) {
            return Err(AppError::PlatformError("member lookup failed".into()));
        }
        Ok(Some(
            self.roles
                .lock()
                .unwrap()
                .get(user_id)
                .map(|r| r.iter().cloned().collect())
                .unwrap_or_default(),
        ))
    }

    async fn add_role(&self, user_id: &str, role_id: &str) -> Result<(), AppError> {
        self.log(format!("add_role:{}:{}", user_id, role_id));
        if self.hold_add_role.load(Ordering::SeqCst) {
            self.add_role_entered.notify_one();
            self.add_role_release.notified().await;
        }
        if self.fail_add_role.load(Ordering::SeqCst) {
            return Err(AppError::PlatformError("missing permissions".into()));
        }
        self.grant(user_id, role_id);
        Ok(())
    }

    async fn remove_role(&self, user_id: &str, role_id: &str) -> Result<(), AppError> {
        self.log(format!("remove_role:{}:{}", user_id, role_id));
        if self.fail_remove_role.load(Ordering::SeqCst) {
            return Err(AppError::PlatformError("missing permissions".into()));
        }
        if let Some(roles) = self.roles.lock().unwrap().get_mut(user_id) {
            roles.remove(role_id);
        }
        Ok(())
    }

    async fn hide_channel(&self, channel_id: &str, user_id: &str) -> Result<(), AppError> {
        self.log(format!("hide_channel:{}:{}", channel_id, user_id));
        Ok(())
    }

    async fn restore_channel_access(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        self.log(format!("restore_channel:{}:{}", channel_id, user_id));
        Ok(())
    }

    async fn post_start_prompt(
        &self,
        channel_id: &str,
        prompt: &StartPrompt,
    ) -> Result<String, AppError> {
        let id = format!("m{}", self.next_message.fetch_add(1, Ordering::SeqCst) + 1);
        self.log(format!(
            "post_prompt:{}:{}:{}",
            channel_id,
            id,
            prompt.mention_user_id.as_deref().unwrap_or("-")
        ));
        Ok(id)
    }

    async fn latest_start_prompt(&self, channel_id: &str) -> Result<Option<String>, AppError> {
        self.log(format!("scan_prompts:{}", channel_id));
        Ok(self.latest_prompt.lock().unwrap().clone())
    }

    async fn disable_start_prompt(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), AppError> {
        self.log(format!("disable_prompt:{}:{}", channel_id, message_id));
        Ok(())
    }

    async fn send_alert(&self, message: &str) -> Result<(), AppError> {
        self.alerts.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

/// Minimal in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<String, UserProgress>>,
    answers: Mutex<HashMap<String, BTreeMap<usize, AnswerRecord>>>,
    pointers: Mutex<HashMap<String, String>>,
    pub fail_writes: AtomicBool,
}

impl MemoryStore {
    fn check_writable(&self) -> Result<(), AppError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::StoreError("disk full".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    async fn get_user_progress(&self, user_id: &str) -> Result<Option<UserProgress>, AppError> {
        Ok(self.users.lock().unwrap().get(user_id).cloned())
    }

    async fn upsert_user_progress(
        &self,
        user_id: &str,
        update: ProgressUpdate,
    ) -> Result<UserProgress, AppError> {
        self.check_writable()?;
        let mut users = self.users.lock().unwrap();
        let record = users
            .entry(user_id.to_string())
            .or_insert_with(|| UserProgress::new(user_id));
        record.merge(update);
        Ok(record.clone())
    }

    async fn save_answer(&self, user_id: &str, answer: &AnswerRecord) -> Result<(), AppError> {
        self.check_writable()?;
        self.answers
            .lock()
            .unwrap()
            .entry(user_id.to_string())
            .or_default()
            .insert(answer.question_index, answer.clone());
        Ok(())
    }

    async fn get_answers(&self, user_id: &str) -> Result<Vec<AnswerRecord>, AppError> {
        Ok(self
            .answers
            .lock()
            .unwrap()
            .get(user_id)
            .map(|a| a.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_active_start_pointer(&self, channel_id: &str) -> Result<Option<String>, AppError> {
        Ok(self.pointers.lock().unwrap().get(channel_id).cloned())
    }

    async fn set_active_start_pointer(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), AppError> {
        self.check_writable()?;
        self.pointers
            .lock()
            .unwrap()
            .insert(channel_id.to_string(), message_id.to_string());
        Ok(())
    }

    async fn clear_user_data(&self, user_id: &str) -> Result<(), AppError> {
        self.check_writable()?;
        self.users.lock().unwrap().remove(user_id);
        self.answers.lock().unwrap().remove(user_id);
        Ok(())
    }
}

fn option(key: &str, label: &str) -> QuizOption {
    QuizOption {
        key: key.to_string(),
        label: label.to_string(),
    }
}

/// Two questions: Q0 {A, B}, Q1 {A, C}; A->cat1, B->cat2, C->cat3.
pub fn two_question_content() -> QuizContent {
    QuizContent {
        definition: QuizDefinition {
            questions: vec![
                Question {
                    prompt: "First question".into(),
                    options: vec![option("A", "x"), option("B", "y")],
                },
                Question {
                    prompt: "Second question".into(),
                    options: vec![option("A", "x"), option("C", "z")],
                },
            ],
            outcome_map: HashMap::from([
                ("A".to_string(), "cat1".to_string()),
                ("B".to_string(), "cat2".to_string()),
                ("C".to_string(), "cat3".to_string()),
            ]),
        },
        categories: vec![
            category("cat1", "Eric", "r1"),
            category("cat2", "Bullet", "r2"),
            category("cat3", "Ellie", "r3"),
        ],
        ..QuizContent::default()
    }
}

pub fn empty_content() -> QuizContent {
    QuizContent {
        categories: vec![category("cat1", "Eric", "r1")],
        ..QuizContent::default()
    }
}

fn category(id: &str, name: &str, role_id: &str) -> OutcomeCategory {
    OutcomeCategory {
        id: id.to_string(),
        name: name.to_string(),
        role_id: role_id.to_string(),
    }
}

pub fn settings() -> EngineSettings {
    EngineSettings {
        quiz_title: "Test Quiz".to_string(),
        quiz_channel_id: None,
        role_removal_before_assign: false,
        auto_welcome: false,
        welcome_message: "Welcome!".to_string(),
        access_revocation_delay: Duration::from_secs(60),
        debounce_window: Duration::from_millis(800),
    }
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    ))
}

pub struct Harness {
    pub engine: Arc<QuizEngine>,
    pub store: Arc<dyn QuizStore>,
    pub platform: Arc<FakePlatform>,
    pub clock: Arc<ManualClock>,
}

pub fn harness_with(
    content: QuizContent,
    store: Arc<dyn QuizStore>,
    settings: EngineSettings,
) -> Harness {
    let platform = Arc::new(FakePlatform::default());
    let clock = manual_clock();
    let engine = Arc::new(QuizEngine::new(
        Arc::new(content),
        store.clone(),
        platform.clone(),
        clock.clone(),
        settings,
    ));
    Harness {
        engine,
        store,
        platform,
        clock,
    }
}

pub fn harness(content: QuizContent) -> Harness {
    harness_with(content, Arc::new(MemoryStore::default()), settings())
}

pub fn test_config(store_path: PathBuf) -> Config {
    Config {
        discord_token: "test-token".to_string(),
        discord_api_base: "http://127.0.0.1:9".to_string(),
        guild_id: "g1".to_string(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        quiz_channel_id: None,
        alert_channel_id: None,
        role_removal_before_assign: false,
        auto_welcome: false,
        welcome_message: "Welcome!".to_string(),
        quiz_title: "Test Quiz".to_string(),
        quiz_config_dir: PathBuf::from("config"),
        store_path,
        database_url: None,
        bind_addr: "127.0.0.1:0".to_string(),
        access_revocation_delay: Duration::from_secs(60),
        debounce_window: Duration::ZERO,
        rust_log: "error".to_string(),
    }
}
