// src/platform/mod.rs

pub mod discord;

use async_trait::async_trait;

use crate::error::AppError;

pub use discord::DiscordRest;

/// Content of a public "start quiz" prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartPrompt {
    pub title: String,
    pub description: String,
    /// Member to mention above the prompt, e.g. on join.
    pub mention_user_id: Option<String>,
}

/// Outbound calls into the chat platform.
///
/// Every call is best-effort from the quiz's point of view; callers decide
/// whether a failure matters.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Role ids currently held by the member, or `None` if they are not in the guild.
    async fn member_role_ids(&self, user_id: &str) -> Result<Option<Vec<String>>, AppError>;

    async fn add_role(&self, user_id: &str, role_id: &str) -> Result<(), AppError>;

    async fn remove_role(&self, user_id: &str, role_id: &str) -> Result<(), AppError>;

    /// Denies the member view access to the channel via a member overwrite.
    async fn hide_channel(&self, channel_id: &str, user_id: &str) -> Result<(), AppError>;

    /// Deletes the member overwrite on the channel, if any.
    async fn restore_channel_access(&self, channel_id: &str, user_id: &str)
    -> Result<(), AppError>;

    /// Posts a start prompt and returns the new message id.
    async fn post_start_prompt(
        &self,
        channel_id: &str,
        prompt: &StartPrompt,
    ) -> Result<String, AppError>;

    /// Newest start prompt posted by this bot among the channel's recent
    /// messages, if any.
    async fn latest_start_prompt(&self, channel_id: &str) -> Result<Option<String>, AppError>;

    /// Greys out the start button on an older prompt.
    async fn disable_start_prompt(&self, channel_id: &str, message_id: &str)
    -> Result<(), AppError>;

    /// Sends a message to the operator alert channel.
    async fn send_alert(&self, message: &str) -> Result<(), AppError>;
}
