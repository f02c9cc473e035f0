// src/config.rs

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;

/// Window inside which repeated interactions from one user are dropped.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(800);

/// Delay between finalizing a quiz and hiding the intake channel from the user.
pub const ACCESS_REVOCATION_DELAY: Duration = Duration::from_secs(60);

/// Upper bound on options per question.
pub const MAX_OPTIONS_PER_QUESTION: usize = 6;

/// Option keys a question may use.
pub const OPTION_KEY_ALPHABET: [char; MAX_OPTIONS_PER_QUESTION] = ['A', 'B', 'C', 'D', 'E', 'F'];

/// Custom id carried by the "start quiz" button.
pub const START_BUTTON_ID: &str = "quiz:start";

pub const DEFAULT_WELCOME_MESSAGE: &str = "Welcome! Take the quiz to get your role.";

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub discord_api_base: String,
    pub guild_id: String,
    pub jwt_secret: String,
    pub quiz_channel_id: Option<String>,
    pub alert_channel_id: Option<String>,
    pub role_removal_before_assign: bool,
    pub auto_welcome: bool,
    pub welcome_message: String,
    pub quiz_title: String,
    pub quiz_config_dir: PathBuf,
    pub store_path: PathBuf,
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub access_revocation_delay: Duration,
    pub debounce_window: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let discord_token = env::var("DISCORD_TOKEN")
            .expect("DISCORD_TOKEN must be set");

        let guild_id = env::var("GUILD_ID")
            .expect("GUILD_ID must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let discord_api_base = env::var("DISCORD_API_BASE")
            .unwrap_or_else(|_| "https://discord.com/api/v10".to_string());

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        Self {
            discord_token,
            discord_api_base,
            guild_id,
            jwt_secret,
            quiz_channel_id: non_empty_var("QUIZ_CHANNEL_ID"),
            alert_channel_id: non_empty_var("ALERT_CHANNEL_ID"),
            role_removal_before_assign: flag("ROLE_REMOVAL_BEFORE_ASSIGN"),
            auto_welcome: flag("AUTO_WELCOME"),
            welcome_message: non_empty_var("WELCOME_MESSAGE")
                .unwrap_or_else(|| DEFAULT_WELCOME_MESSAGE.to_string()),
            quiz_title: non_empty_var("QUIZ_TITLE")
                .unwrap_or_else(|| "Character Quiz".to_string()),
            quiz_config_dir: non_empty_var("QUIZ_CONFIG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config")),
            store_path: non_empty_var("STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/store.json")),
            database_url: non_empty_var("DATABASE_URL"),
            bind_addr: non_empty_var("BIND_ADDR")
                .unwrap_or_else(|| "0.0.0.0:3000".to_string()),
            access_revocation_delay: ACCESS_REVOCATION_DELAY,
            debounce_window: DEBOUNCE_WINDOW,
            rust_log,
        }
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

// Only the literal "true" enables a toggle.
fn flag(key: &str) -> bool {
    env::var(key).map(|v| v == "true").unwrap_or(false)
}
