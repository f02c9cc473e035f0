// src/services/finalize.rs

use serde::Serialize;

use crate::{error::AppError, services::scoring::ScoreOutcome};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied,
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct SagaStep {
    pub name: String,
    pub outcome: StepOutcome,
}

/// Record of every side effect attempted while finalizing one user.
///
/// Steps never roll each other back; a failure is recorded and the saga moves on.
#[derive(Debug, Clone, Serialize)]
pub struct FinalizeReport {
    pub user_id: String,
    pub score: ScoreOutcome,
    pub steps: Vec<SagaStep>,
}

impl FinalizeReport {
    pub fn new(user_id: &str, score: ScoreOutcome) -> Self {
        Self {
            user_id: user_id.to_string(),
            score,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, name: impl Into<String>, result: Result<(), AppError>) {
        let outcome = match result {
            Ok(()) => StepOutcome::Applied,
            Err(e) => StepOutcome::Failed(e.to_string()),
        };
        self.steps.push(SagaStep {
            name: name.into(),
            outcome,
        });
    }

    pub fn skip(&mut self, name: impl Into<String>, reason: impl Into<String>) {
        self.steps.push(SagaStep {
            name: name.into(),
            outcome: StepOutcome::Skipped(reason.into()),
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &SagaStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn log(&self) {
        for step in &self.steps {
            match &step.outcome {
                StepOutcome::Applied => {
                    tracing::info!("[finalize {}] {}: applied", self.user_id, step.name)
                }
                StepOutcome::Skipped(reason) => {
                    tracing::info!(
                        "[finalize {}] {}: skipped ({})",
                        self.user_id,
                        step.name,
                        reason
                    )
                }
                StepOutcome::Failed(err) => {
                    tracing::warn!("[finalize {}] {}: failed ({})", self.user_id, step.name, err)
                }
            }
        }
    }

    /// Operator alert text summarising failed steps.
    pub fn alert_text(&self) -> String {
        let failed: Vec<String> = self
            .steps
            .iter()
            .filter_map(|s| match &s.outcome {
                StepOutcome::Failed(err) => Some(format!("- {}: {}", s.name, err)),
                _ => None,
            })
            .collect();
        format!(
            "⚠️ Finalize for user {} had failing steps:\n{}",
            self.user_id,
            failed.join("\n")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::progress::Tally;

    fn report() -> FinalizeReport {
        FinalizeReport::new(
            "u1",
            ScoreOutcome {
                top_category_id: Some("cat1".into()),
                tally: Tally::new(),
            },
        )
    }

    #[test]
    fn test_failures_are_collected_without_stopping() {
        let mut report = report();
        report.record("remove_role:r2", Err(AppError::PlatformError("403".into())));
        report.record("add_role:r1", Ok(()));
        report.skip("revoke_access", "no quiz channel");

        assert_eq!(report.steps.len(), 3);
        assert!(report.has_failures());
        assert_eq!(report.failures().count(), 1);
        assert!(report.alert_text().contains("remove_role:r2"));
    }

    #[test]
    fn test_clean_report() {
        let mut report = report();
        report.record("add_role:r1", Ok(()));
        assert!(!report.has_failures());
    }
}
