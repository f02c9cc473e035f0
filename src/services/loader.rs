// src/services/loader.rs

use std::collections::HashMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use validator::Validate;

use crate::{
    error::AppError,
    models::quiz::{
        CategoryFile, OutcomeCategory, QuizContent, QuizDefinition, QuizMedia, ResultContent,
    },
};

pub const QUIZ_FILE: &str = "quiz.json";
pub const CATEGORIES_FILE: &str = "characters.json";
pub const RESULTS_FILE: &str = "results.json";
pub const MEDIA_FILE: &str = "quiz_media.json";

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| AppError::NotFound(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::BadRequest(format!("{}: {}", path.display(), e)))
}

/// Loads the question set. Missing, malformed or invalid files degrade to an empty quiz.
pub fn load_definition(dir: &Path) -> QuizDefinition {
    let path = dir.join(QUIZ_FILE);
    let definition = match read_json::<QuizDefinition>(&path) {
        Ok(definition) => definition,
        Err(e) => {
            tracing::warn!("Quiz not configured: {}", e);
            return QuizDefinition::default();
        }
    };

    if let Err(errors) = definition.validate() {
        tracing::warn!("Quiz definition rejected: {}", errors);
        return QuizDefinition::default();
    }

    definition.normalize()
}

/// Loads outcome categories, degrading to none.
pub fn load_categories(dir: &Path) -> Vec<OutcomeCategory> {
    match read_json::<CategoryFile>(&dir.join(CATEGORIES_FILE)) {
        Ok(file) => file.characters,
        Err(e) => {
            tracing::warn!("No outcome categories loaded: {}", e);
            Vec::new()
        }
    }
}

/// Optional rich result content keyed by category id.
pub fn load_results(dir: &Path) -> HashMap<String, ResultContent> {
    let path = dir.join(RESULTS_FILE);
    if !path.exists() {
        return HashMap::new();
    }
    read_json(&path).unwrap_or_else(|e| {
        tracing::warn!("Ignoring result content: {}", e);
        HashMap::new()
    })
}

pub fn load_media(dir: &Path) -> QuizMedia {
    let path = dir.join(MEDIA_FILE);
    if !path.exists() {
        return QuizMedia::default();
    }
    read_json(&path).unwrap_or_else(|e| {
        tracing::warn!("Ignoring quiz media: {}", e);
        QuizMedia::default()
    })
}

/// Loads everything in the quiz config directory. Never fails.
pub fn load_quiz_content(dir: &Path) -> QuizContent {
    let content = QuizContent {
        definition: load_definition(dir),
        categories: load_categories(dir),
        results: load_results(dir),
        media: load_media(dir),
    };

    tracing::info!(
        "Loaded {} questions, {} categories, {} result entries from {}",
        content.definition.questions.len(),
        content.categories.len(),
        content.results.len(),
        dir.display()
    );

    for (key, category_id) in &content.definition.outcome_map {
        if content.category(category_id).is_none() {
            tracing::warn!("Option {} maps to unknown category {}", key, category_id);
        }
    }

    content
}
