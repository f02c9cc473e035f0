// src/models/quiz.rs

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::config::{MAX_OPTIONS_PER_QUESTION, OPTION_KEY_ALPHABET};

/// The ordered question set, read from `quiz.json`.
///
/// Immutable once loaded. An empty `questions` list is the "not configured" state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuizDefinition {
    #[serde(default)]
    #[validate(nested)]
    pub questions: Vec<Question>,

    /// Flat option-key to category-id map shared by every question.
    /// "A" on question 1 and "A" on question 7 count toward the same category.
    #[serde(default)]
    pub outcome_map: HashMap<String, String>,
}

impl QuizDefinition {
    pub fn is_configured(&self) -> bool {
        !self.questions.is_empty()
    }

    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    /// Upper-cases option keys and outcome-map keys so lookups are uniform.
    pub fn normalize(mut self) -> Self {
        for question in &mut self.questions {
            for option in &mut question.options {
                option.key = option.key.trim().to_ascii_uppercase();
            }
        }
        self.outcome_map = self
            .outcome_map
            .into_iter()
            .map(|(k, v)| (k.trim().to_ascii_uppercase(), v))
            .collect();
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Question {
    #[validate(length(min = 1, max = 4000))]
    pub prompt: String,

    #[validate(
        length(min = 1, max = 6),
        custom(function = validate_option_keys)
    )]
    pub options: Vec<QuizOption>,
}

impl Question {
    pub fn has_option(&self, key: &str) -> bool {
        self.options.iter().any(|o| o.key.eq_ignore_ascii_case(key))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizOption {
    /// Single letter, `A` through `F`, unique within its question.
    pub key: String,
    pub label: String,
}

fn validate_option_keys(options: &[QuizOption]) -> Result<(), ValidationError> {
    if options.len() > MAX_OPTIONS_PER_QUESTION {
        return Err(ValidationError::new("too_many_options"));
    }
    let mut seen = HashSet::new();
    for option in options {
        let mut chars = option.key.trim().chars();
        let key = match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_ascii_uppercase(),
            _ => return Err(ValidationError::new("option_key_not_single_letter")),
        };
        if !OPTION_KEY_ALPHABET.contains(&key) {
            return Err(ValidationError::new("option_key_out_of_range"));
        }
        if !seen.insert(key) {
            return Err(ValidationError::new("duplicate_option_key"));
        }
        if option.label.trim().is_empty() {
            return Err(ValidationError::new("option_label_empty"));
        }
    }
    Ok(())
}

/// One possible quiz result, tied to an externally managed role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeCategory {
    pub id: String,
    pub name: String,
    pub role_id: String,
}

/// Shape of `characters.json`.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryFile {
    #[serde(default, alias = "categories")]
    pub characters: Vec<OutcomeCategory>,
}

/// Rich result text for a category, read from `results.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultContent {
    pub heading: Option<String>,
    pub subtitle: Option<String>,
    pub body: Option<String>,
    /// Image path or URL shown with the result.
    pub image: Option<String>,
    /// Optional link appended to the body.
    pub teaser: Option<String>,
}

/// Shape of `quiz_media.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizMedia {
    #[serde(default)]
    pub question_gifs: Vec<Option<String>>,
}

/// Everything loaded from the quiz config directory at startup.
/// Built once and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct QuizContent {
    pub definition: QuizDefinition,
    pub categories: Vec<OutcomeCategory>,
    pub results: HashMap<String, ResultContent>,
    pub media: QuizMedia,
}

impl QuizContent {
    pub fn category(&self, id: &str) -> Option<&OutcomeCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// First configured category whose role appears in `role_ids`.
    pub fn held_category(&self, role_ids: &[String]) -> Option<&OutcomeCategory> {
        self.categories
            .iter()
            .find(|c| role_ids.iter().any(|r| r == &c.role_id))
    }

    pub fn image_for_question(&self, index: usize) -> Option<&str> {
        self.media
            .question_gifs
            .get(index)
            .and_then(|g| g.as_deref())
            .filter(|g| !g.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(key: &str) -> QuizOption {
        QuizOption {
            key: key.to_string(),
            label: format!("label {key}"),
        }
    }

    #[test]
    fn test_valid_question_passes() {
        let q = Question {
            prompt: "Pick one".to_string(),
            options: vec![option("A"), option("B")],
        };
        assert!(q.validate().is_ok());
    }

    #[test]
    fn test_rejects_duplicate_and_out_of_range_keys() {
        let dup = Question {
            prompt: "Pick".to_string(),
            options: vec![option("A"), option("a")],
        };
        assert!(dup.validate().is_err());

        let out_of_range = Question {
            prompt: "Pick".to_string(),
            options: vec![option("G")],
        };
        assert!(out_of_range.validate().is_err());
    }

    #[test]
    fn test_rejects_empty_options() {
        let q = Question {
            prompt: "Pick".to_string(),
            options: vec![],
        };
        assert!(q.validate().is_err());
    }

    #[test]
    fn test_nested_validation_reaches_questions() {
        let def = QuizDefinition {
            questions: vec![Question {
                prompt: String::new(),
                options: vec![option("A")],
            }],
            outcome_map: HashMap::new(),
        };
        assert!(def.validate().is_err());
    }

    #[test]
    fn test_normalize_upper_cases_outcome_keys() {
        let def = QuizDefinition {
            questions: vec![],
            outcome_map: HashMap::from([("a".to_string(), "cat1".to_string())]),
        }
        .normalize();
        assert_eq!(def.outcome_map.get("A").map(String::as_str), Some("cat1"));
        assert!(!def.outcome_map.contains_key("a"));
    }
}
