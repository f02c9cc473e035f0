// src/services/engine.rs

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::{
    config::Config,
    error::AppError,
    models::{
        event::{InteractionEvent, RenderInstruction},
        progress::{AnswerRecord, ProgressReport, ProgressUpdate, QuizState},
        quiz::QuizContent,
    },
    platform::{ChatPlatform, StartPrompt},
    services::{
        debounce::Debouncer,
        finalize::FinalizeReport,
        gate::{self, Access, GatingPolicy},
        render::{render_question, render_result},
        scoring::score_answers,
    },
    store::QuizStore,
    utils::{clock::Clock, text::truncate_chars},
};

/// Knobs the engine reads from configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub quiz_title: String,
    pub quiz_channel_id: Option<String>,
    pub role_removal_before_assign: bool,
    pub auto_welcome: bool,
    pub welcome_message: String,
    pub access_revocation_delay: Duration,
    pub debounce_window: Duration,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quiz_title: config.quiz_title.clone(),
            quiz_channel_id: config.quiz_channel_id.clone(),
            role_removal_before_assign: config.role_removal_before_assign,
            auto_welcome: config.auto_welcome,
            welcome_message: config.welcome_message.clone(),
            access_revocation_delay: config.access_revocation_delay,
            debounce_window: config.debounce_window,
        }
    }
}

/// Outcome of an administrative reset.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ResetOutcome {
    pub user_id: String,
    pub channel_access_restored: bool,
}

/// Quiz progression: NotStarted -> InProgress(index) -> Completed.
///
/// Every transition re-checks the gate against live role membership.
/// Transitions for one user are serialized through a per-user lock.
pub struct QuizEngine {
    content: Arc<QuizContent>,
    store: Arc<dyn QuizStore>,
    platform: Arc<dyn ChatPlatform>,
    clock: Arc<dyn Clock>,
    gate: GatingPolicy,
    debouncer: Debouncer,
    settings: EngineSettings,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl QuizEngine {
    pub fn new(
        content: Arc<QuizContent>,
        store: Arc<dyn QuizStore>,
        platform: Arc<dyn ChatPlatform>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            gate: GatingPolicy::new(content.clone()),
            debouncer: Debouncer::new(settings.debounce_window, clock.clone()),
            content,
            store,
            platform,
            clock,
            settings,
            user_locks: DashMap::new(),
        }
    }

    pub fn content(&self) -> &QuizContent {
        &self.content
    }

    /// Entry point for one interaction. Never returns an error: failures become
    /// a generic "temporary issue" instruction and an operator alert.
    pub async fn handle(&self, event: InteractionEvent) -> RenderInstruction {
        let user_id = event.user_id().to_string();
        let kind = event.kind();

        if self.debouncer.should_drop(&user_id) {
            tracing::debug!("Debounced {} from {}", kind, user_id);
            return RenderInstruction::Acknowledged;
        }

        let lock = self.user_lock(&user_id);
        let _guard = lock.lock().await;

        let result = match event {
            InteractionEvent::StartRequested {
                user_id,
                channel_id,
                message_id,
            } => self.start(&user_id, &channel_id, message_id.as_deref()).await,
            InteractionEvent::AnswerSubmitted {
                user_id,
                question_index,
                option_key,
            } => self.answer(&user_id, question_index, &option_key).await,
            InteractionEvent::AdvanceRequested {
                user_id,
                question_index,
            } => self.advance(&user_id, question_index).await,
        };

        match result {
            Ok(render) => render,
            Err(e) => {
                tracing::error!("Interaction error ({} from {}): {}", kind, user_id, e);
                self.alert(&format!(
                    "⚠️ Interaction error\nUser: {}\nType: {}\nError: {}",
                    user_id,
                    kind,
                    truncate_chars(&e.to_string(), 400)
                ))
                .await;
                RenderInstruction::temporary_issue()
            }
        }
    }

    /// `start`: NotStarted/InProgress -> InProgress(0).
    pub async fn start(
        &self,
        user_id: &str,
        channel_id: &str,
        clicked_message_id: Option<&str>,
    ) -> Result<RenderInstruction, AppError> {
        if let Some(clicked) = clicked_message_id {
            let active = match self.store.get_active_start_pointer(channel_id).await? {
                Some(active) => Some(active),
                None => self.resolve_start_prompt(channel_id).await?,
            };
            if let Some(active) = active {
                if active != clicked {
                    tracing::info!(
                        "Stale start prompt {} clicked by {} (active {})",
                        clicked,
                        user_id,
                        active
                    );
                    return Ok(RenderInstruction::stale_prompt());
                }
            }
        }

        if let Some(denied) = self.gate_denial(user_id).await {
            return Ok(denied);
        }

        if !self.content.definition.is_configured() {
            return Ok(RenderInstruction::not_configured());
        }

        self.store
            .upsert_user_progress(user_id, ProgressUpdate::started(self.clock.now()))
            .await?;
        tracing::info!("Quiz started by {}", user_id);

        self.question_or_error(0)
    }

    /// `answer`: records the answer, then renders the next question or finalizes.
    pub async fn answer(
        &self,
        user_id: &str,
        question_index: usize,
        option_key: &str,
    ) -> Result<RenderInstruction, AppError> {
        if let Some(denied) = self.gate_denial(user_id).await {
            return Ok(denied);
        }

        if !self.content.definition.is_configured() {
            return Ok(RenderInstruction::not_configured());
        }

        let Some(question) = self.content.definition.question(question_index) else {
            return Ok(RenderInstruction::unknown_question());
        };

        let key = option_key.trim().to_ascii_uppercase();
        if key.is_empty() || !question.has_option(&key) {
            return Ok(RenderInstruction::invalid_option());
        }

        let record = AnswerRecord {
            question_index,
            option_key: key,
            created_at: self.clock.now(),
        };
        self.store.save_answer(user_id, &record).await?;
        tracing::debug!(
            "{} answered Q{} with {}",
            user_id,
            question_index + 1,
            record.option_key
        );

        let next_index = question_index + 1;
        if self.content.definition.question(next_index).is_some() {
            self.question_or_error(next_index)
        } else {
            self.finalize(user_id).await
        }
    }

    /// `advance`: re-renders a question without touching stored answers.
    /// Out-of-range indexes fall through to finalize.
    pub async fn advance(
        &self,
        user_id: &str,
        question_index: usize,
    ) -> Result<RenderInstruction, AppError> {
        if let Some(denied) = self.gate_denial(user_id).await {
            return Ok(denied);
        }

        if !self.content.definition.is_configured() {
            return Ok(RenderInstruction::not_configured());
        }

        match render_question(&self.content, &self.settings.quiz_title, question_index) {
            Some(render) => Ok(render),
            None => {
                tracing::warn!(
                    "Advance to missing question {} by {}, finalizing",
                    question_index,
                    user_id
                );
                self.finalize(user_id).await
            }
        }
    }

    /// Entry into `Completed`.
    pub async fn finalize(&self, user_id: &str) -> Result<RenderInstruction, AppError> {
        Ok(self.finalize_with_report(user_id).await?.0)
    }

    /// Finalize and return the saga report alongside the render.
    /// The report is `None` when the gate short-circuited.
    pub async fn finalize_with_report(
        &self,
        user_id: &str,
    ) -> Result<(RenderInstruction, Option<FinalizeReport>), AppError> {
        // A role may have been granted by staff since the last transition.
        let check = self.gate.check(self.platform.as_ref(), user_id).await;
        if let Access::Denied(category) = &check.access {
            return Ok((gate::denied(category), None));
        }

        let answers = self.store.get_answers(user_id).await?;
        let score = score_answers(&answers, &self.content.definition.outcome_map);
        let winner_role = score
            .top_category_id
            .as_deref()
            .and_then(|id| self.content.category(id))
            .map(|c| c.role_id.clone());

        let mut report = FinalizeReport::new(user_id, score.clone());

        if self.settings.role_removal_before_assign {
            for category in &self.content.categories {
                if Some(&category.role_id) == winner_role.as_ref() {
                    continue;
                }
                let held = check
                    .held_roles
                    .as_ref()
                    .is_none_or(|roles| roles.contains(&category.role_id));
                if !held {
                    continue;
                }
                let result = self.platform.remove_role(user_id, &category.role_id).await;
                report.record(format!("remove_role:{}", category.role_id), result);
            }
        }

        match &winner_role {
            Some(role_id) => {
                let result = self.platform.add_role(user_id, role_id).await;
                report.record(format!("add_role:{}", role_id), result);
            }
            None => report.skip("add_role", "no winning category role"),
        }

        let progress = self
            .store
            .upsert_user_progress(
                user_id,
                ProgressUpdate::completed(
                    self.clock.now(),
                    score.top_category_id.clone(),
                    score.tally.clone(),
                ),
            )
            .await?;
        tracing::info!(
            "Quiz completed by {}: {:?} {:?}",
            user_id,
            progress.top_category_id,
            progress.tally
        );

        let render = render_result(&self.content, score.top_category_id.as_deref());

        match &self.settings.quiz_channel_id {
            Some(channel_id) => {
                self.schedule_access_revocation(channel_id.clone(), user_id.to_string());
                report.skip("revoke_access", "scheduled");
            }
            None => report.skip("revoke_access", "no quiz channel configured"),
        }

        report.log();
        if report.has_failures() {
            self.alert(&report.alert_text()).await;
        }

        Ok((render, Some(report)))
    }

    /// Deletes a user's progress and answers, ending the current quiz lifetime.
    ///
    /// Waits for any in-flight transition of the same user to finish first.
    pub async fn clear_user_data(&self, user_id: &str) -> Result<(), AppError> {
        let lock = self.user_lock(user_id);
        let guard = lock.lock().await;

        self.store.clear_user_data(user_id).await?;
        self.debouncer.forget(user_id);

        // Only drop the entry if nobody else is holding or waiting on it.
        self.user_locks
            .remove_if(user_id, |_, entry| Arc::strong_count(entry) == 2);
        drop(guard);

        tracing::info!("Cleared quiz data for {}", user_id);
        Ok(())
    }

    /// Member left the guild.
    pub async fn member_left(&self, user_id: &str) -> Result<(), AppError> {
        self.clear_user_data(user_id).await
    }

    /// Member (re)joined: clear unconditionally, then optionally invite them.
    pub async fn member_joined(&self, user_id: &str) -> Result<Option<String>, AppError> {
        self.clear_user_data(user_id).await?;

        if !self.settings.auto_welcome {
            return Ok(None);
        }
        let Some(channel_id) = self.settings.quiz_channel_id.clone() else {
            return Ok(None);
        };

        if let Err(e) = self.platform.restore_channel_access(&channel_id, user_id).await {
            tracing::warn!("Could not restore quiz channel access for {}: {}", user_id, e);
        }

        match self.publish_start_prompt(&channel_id, Some(user_id)).await {
            Ok(message_id) => Ok(Some(message_id)),
            Err(e) => {
                tracing::warn!("Could not post welcome prompt for {}: {}", user_id, e);
                Ok(None)
            }
        }
    }

    /// Admin reset: clear stored data and drop the intake channel overwrite.
    pub async fn admin_reset(&self, user_id: &str) -> Result<ResetOutcome, AppError> {
        self.clear_user_data(user_id).await?;

        let channel_access_restored = match &self.settings.quiz_channel_id {
            Some(channel_id) => {
                match self.platform.restore_channel_access(channel_id, user_id).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            "Could not restore quiz channel access for {}: {}",
                            user_id,
                            e
                        );
                        false
                    }
                }
            }
            None => false,
        };

        Ok(ResetOutcome {
            user_id: user_id.to_string(),
            channel_access_restored,
        })
    }

    /// Posts a fresh start prompt and makes it the channel's only valid one.
    pub async fn publish_start_prompt(
        &self,
        channel_id: &str,
        mention_user_id: Option<&str>,
    ) -> Result<String, AppError> {
        let prompt = StartPrompt {
            title: self.settings.quiz_title.clone(),
            description: self.settings.welcome_message.clone(),
            mention_user_id: mention_user_id.map(str::to_string),
        };
        let message_id = self.platform.post_start_prompt(channel_id, &prompt).await?;

        let previous = self.store.get_active_start_pointer(channel_id).await?;
        self.store
            .set_active_start_pointer(channel_id, &message_id)
            .await?;

        if let Some(previous) = previous.filter(|p| p != &message_id) {
            if let Err(e) = self.platform.disable_start_prompt(channel_id, &previous).await {
                tracing::warn!("Could not disable old start prompt {}: {}", previous, e);
            }
        }

        tracing::info!("Start prompt {} is now active in {}", message_id, channel_id);
        Ok(message_id)
    }

    /// Falls back to the newest start prompt found in channel history and
    /// records it as active. Lookup failures leave the channel unpointed.
    async fn resolve_start_prompt(&self, channel_id: &str) -> Result<Option<String>, AppError> {
        let latest = match self.platform.latest_start_prompt(channel_id).await {
            Ok(latest) => latest,
            Err(e) => {
                tracing::warn!("Could not scan {} for start prompts: {}", channel_id, e);
                return Ok(None);
            }
        };
        if let Some(message_id) = &latest {
            self.store
                .set_active_start_pointer(channel_id, message_id)
                .await?;
            tracing::info!(
                "Recovered active start prompt {} in {}",
                message_id,
                channel_id
            );
        }
        Ok(latest)
    }

    pub async fn active_start_prompt(&self, channel_id: &str) -> Result<Option<String>, AppError> {
        self.store.get_active_start_pointer(channel_id).await
    }

    pub async fn progress_report(&self, user_id: &str) -> Result<ProgressReport, AppError> {
        let progress = self.store.get_user_progress(user_id).await?;
        let answers = self.store.get_answers(user_id).await?;
        Ok(ProgressReport {
            user_id: user_id.to_string(),
            state: progress
                .as_ref()
                .map(|p| p.state())
                .unwrap_or(QuizState::NotStarted),
            progress,
            answers,
        })
    }

    /// Best-effort message to the operator alert channel.
    pub async fn alert(&self, message: &str) {
        if let Err(e) = self.platform.send_alert(message).await {
            tracing::warn!("Failed to send operator alert: {}", e);
        }
    }

    async fn gate_denial(&self, user_id: &str) -> Option<RenderInstruction> {
        match self.gate.check(self.platform.as_ref(), user_id).await.access {
            Access::Denied(category) => Some(gate::denied(&category)),
            Access::Granted => None,
        }
    }

    fn question_or_error(&self, index: usize) -> Result<RenderInstruction, AppError> {
        render_question(&self.content, &self.settings.quiz_title, index).ok_or_else(|| {
            AppError::InternalServerError(format!("Unable to render question {}", index))
        })
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// Hides the intake channel from the user after the configured delay.
    /// Not durable: a restart before the delay elapses drops it.
    fn schedule_access_revocation(&self, channel_id: String, user_id: String) {
        let platform = self.platform.clone();
        let delay = self.settings.access_revocation_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match platform.hide_channel(&channel_id, &user_id).await {
                Ok(()) => tracing::info!("Hid quiz channel {} from {}", channel_id, user_id),
                Err(e) => {
                    tracing::warn!("Failed to hide quiz channel from {}: {}", user_id, e);
                    let _ = platform
                        .send_alert(&format!(
                            "⚠️ Could not hide quiz channel from user {}: {}",
                            user_id, e
                        ))
                        .await;
                }
            }
        });
    }
}
