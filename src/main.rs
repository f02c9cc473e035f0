// src/main.rs

use std::sync::Arc;

use dotenvy::dotenv;
use quiz_bot::config::Config;
use quiz_bot::platform::{ChatPlatform, DiscordRest};
use quiz_bot::routes;
use quiz_bot::services::engine::{EngineSettings, QuizEngine};
use quiz_bot::services::loader::load_quiz_content;
use quiz_bot::state::AppState;
use quiz_bot::store::open_store;
use quiz_bot::utils::clock::SystemClock;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "quiz-bot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Quiz content is read once; a broken config runs in "not configured" mode.
    let content = Arc::new(load_quiz_content(&config.quiz_config_dir));

    let store = open_store(&config)
        .await
        .expect("Failed to open quiz store");

    let platform: Arc<dyn ChatPlatform> = Arc::new(
        DiscordRest::from_config(&config).expect("Failed to build Discord client"),
    );

    let engine = Arc::new(QuizEngine::new(
        content,
        store,
        platform,
        Arc::new(SystemClock),
        EngineSettings::from_config(&config),
    ));

    engine
        .alert(&format!("✅ Quiz bot online at {}", chrono::Utc::now().to_rfc3339()))
        .await;

    let state = AppState::new(engine, config.clone());

    // Create the Axum application router
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind listen address");
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutting down");
}
