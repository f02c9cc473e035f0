// src/models/event.rs

use serde::{Deserialize, Serialize};

/// Inbound quiz interaction forwarded by the gateway relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionEvent {
    StartRequested {
        user_id: String,
        channel_id: String,
        /// Id of the start prompt that was clicked, when started from a button.
        #[serde(default)]
        message_id: Option<String>,
    },
    AnswerSubmitted {
        user_id: String,
        question_index: usize,
        option_key: String,
    },
    AdvanceRequested {
        user_id: String,
        question_index: usize,
    },
}

impl InteractionEvent {
    pub fn user_id(&self) -> &str {
        match self {
            InteractionEvent::StartRequested { user_id, .. }
            | InteractionEvent::AnswerSubmitted { user_id, .. }
            | InteractionEvent::AdvanceRequested { user_id, .. } => user_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            InteractionEvent::StartRequested { .. } => "start",
            InteractionEvent::AnswerSubmitted { .. } => "answer",
            InteractionEvent::AdvanceRequested { .. } => "advance",
        }
    }
}

/// Membership change forwarded by the relay.
#[derive(Debug, Clone, Deserialize)]
pub struct MemberEvent {
    pub user_id: String,
}

/// What the presentation layer should show in response to an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RenderInstruction {
    Question(QuestionView),
    FinalResult(ResultView),
    Denied {
        category_id: String,
        category_name: String,
        message: String,
    },
    NotConfigured {
        message: String,
    },
    InvalidInput {
        message: String,
    },
    StalePrompt {
        message: String,
    },
    /// Dropped by the debounce window; the relay only acknowledges.
    Acknowledged,
    TemporaryIssue {
        message: String,
    },
}

impl RenderInstruction {
    pub fn not_configured() -> Self {
        RenderInstruction::NotConfigured {
            message: "Quiz not configured yet. Add config/quiz.json.".to_string(),
        }
    }

    pub fn invalid_option() -> Self {
        RenderInstruction::InvalidInput {
            message: "Please choose a valid option.".to_string(),
        }
    }

    pub fn unknown_question() -> Self {
        RenderInstruction::InvalidInput {
            message: "That question does not exist. Please restart the quiz.".to_string(),
        }
    }

    pub fn malformed_interaction() -> Self {
        RenderInstruction::InvalidInput {
            message: "That selection could not be read. Please pick an option again.".to_string(),
        }
    }

    pub fn stale_prompt() -> Self {
        RenderInstruction::StalePrompt {
            message: "This Start button is no longer active. Please use the most recent one in this channel.".to_string(),
        }
    }

    pub fn temporary_issue() -> Self {
        RenderInstruction::TemporaryIssue {
            message: "We're experiencing a temporary issue handling your request. Our team has been notified. Please try again in a moment.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub question_index: usize,
    /// Component id the answer select menu must carry.
    pub custom_id: String,
    pub title: String,
    pub prompt: String,
    pub options: Vec<OptionView>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionView {
    pub label: String,
    pub value: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultView {
    pub category_id: Option<String>,
    pub title: String,
    pub description: String,
    pub image: Option<String>,
}
