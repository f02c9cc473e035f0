use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;
use crate::services::engine::QuizEngine;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QuizEngine>,
    pub config: Config,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(engine: Arc<QuizEngine>, config: Config) -> Self {
        Self {
            engine,
            config,
            started_at: Instant::now(),
        }
    }
}

impl FromRef<AppState> for Arc<QuizEngine> {
    fn from_ref(state: &AppState) -> Self {
        state.engine.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
