// src/services/gate.rs

use std::sync::Arc;

use crate::{
    models::{event::RenderInstruction, quiz::{OutcomeCategory, QuizContent}},
    platform::ChatPlatform,
};

/// Result of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted,
    /// The member already holds this category's role.
    Denied(OutcomeCategory),
}

/// Gate check plus the membership it was computed from.
#[derive(Debug, Clone)]
pub struct GateCheck {
    pub access: Access,
    /// `None` when membership could not be read.
    pub held_roles: Option<Vec<String>>,
}

/// Blocks the quiz for anyone who currently holds an outcome role.
///
/// Live role membership is the source of truth, not stored progress.
#[derive(Clone)]
pub struct GatingPolicy {
    content: Arc<QuizContent>,
}

impl GatingPolicy {
    pub fn new(content: Arc<QuizContent>) -> Self {
        Self { content }
    }

    pub fn evaluate(&self, role_ids: &[String]) -> Access {
        match self.content.held_category(role_ids) {
            Some(category) => Access::Denied(category.clone()),
            None => Access::Granted,
        }
    }

    /// Reads membership from the platform and evaluates it.
    ///
    /// A failed lookup is logged and treated as "no outcome role held".
    pub async fn check(&self, platform: &dyn ChatPlatform, user_id: &str) -> GateCheck {
        match platform.member_role_ids(user_id).await {
            Ok(Some(roles)) => GateCheck {
                access: self.evaluate(&roles),
                held_roles: Some(roles),
            },
            Ok(None) => GateCheck {
                access: Access::Granted,
                held_roles: Some(Vec::new()),
            },
            Err(e) => {
                tracing::warn!("Could not read roles for {}: {}", user_id, e);
                GateCheck {
                    access: Access::Granted,
                    held_roles: None,
                }
            }
        }
    }
}

/// Fixed response for a denied transition.
pub fn denied(category: &OutcomeCategory) -> RenderInstruction {
    RenderInstruction::Denied {
        category_id: category.id.clone(),
        category_name: category.name.clone(),
        message: format!(
            "You already have a character role: {}. Retakes are disabled. If this seems wrong, contact staff.",
            category.name
        ),
    }
}
