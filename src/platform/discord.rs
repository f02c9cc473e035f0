// src/platform/discord.rs

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::OnceCell;
use url::Url;

use crate::{
    config::{Config, START_BUTTON_ID},
    error::AppError,
    platform::{ChatPlatform, StartPrompt},
};

/// VIEW_CHANNEL permission bit.
const VIEW_CHANNEL: u64 = 1 << 10;

/// Overwrite target type for a single member.
const OVERWRITE_MEMBER: u8 = 1;

const START_BUTTON_LABEL: &str = "Start Character Quiz";

/// How far back channel history is scanned for a start prompt.
const START_PROMPT_SCAN_LIMIT: u8 = 50;

#[derive(Debug, Deserialize)]
struct GuildMember {
    #[serde(default)]
    roles: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CurrentUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChannelMessage {
    id: String,
    author: Option<CurrentUser>,
    #[serde(default)]
    components: Vec<ActionRow>,
}

#[derive(Debug, Deserialize)]
struct ActionRow {
    #[serde(default)]
    components: Vec<Component>,
}

#[derive(Debug, Deserialize)]
struct Component {
    custom_id: Option<String>,
}

impl ChannelMessage {
    fn is_start_prompt_from(&self, bot_user_id: &str) -> bool {
        self.author.as_ref().is_some_and(|a| a.id == bot_user_id)
            && self
                .components
                .iter()
                .flat_map(|row| &row.components)
                .any(|c| c.custom_id.as_deref() == Some(START_BUTTON_ID))
    }
}

/// Discord REST v10 client scoped to one guild.
#[derive(Clone)]
pub struct DiscordRest {
    http: reqwest::Client,
    api_base: String,
    token: String,
    guild_id: String,
    alert_channel_id: Option<String>,
    /// Resolved from `/users/@me` on first use.
    bot_user_id: OnceCell<String>,
}

impl DiscordRest {
    pub fn new(
        api_base: &str,
        token: &str,
        guild_id: &str,
        alert_channel_id: Option<String>,
    ) -> Result<Self, AppError> {
        let parsed = Url::parse(api_base)
            .map_err(|e| {
                AppError::InternalServerError(format!("Invalid Discord API base: {}", e))
            })?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("DiscordBot (quiz-bot, ", env!("CARGO_PKG_VERSION"), ")"))
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_base: parsed.as_str().trim_end_matches('/').to_string(),
            token: token.to_string(),
            guild_id: guild_id.to_string(),
            alert_channel_id,
            bot_user_id: OnceCell::new(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Self::new(
            &config.discord_api_base,
            &config.discord_token,
            &config.guild_id,
            config.alert_channel_id.clone(),
        )
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response, AppError> {
        let url = format!("{}{}", self.api_base, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("Discord {} {} failed: {}", method, path, e);
            AppError::PlatformError(e.to_string())
        })?;
        Ok(response)
    }

    async fn expect_success(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<reqwest::Response, AppError> {
        let response = self.send(method.clone(), path, body).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let detail = response.text().await.unwrap_or_default();
        Err(AppError::PlatformError(format!(
            "{} {} returned {}: {}",
            method,
            path,
            status,
            detail.chars().take(300).collect::<String>()
        )))
    }

    async fn bot_user_id(&self) -> Result<&str, AppError> {
        let id = self
            .bot_user_id
            .get_or_try_init(|| async {
                let me: CurrentUser = self
                    .expect_success(Method::GET, "/users/@me", None)
                    .await?
                    .json()
                    .await?;
                Ok::<_, AppError>(me.id)
            })
            .await?;
        Ok(id.as_str())
    }

    fn start_row(disabled: bool) -> Value {
        json!([{
            "type": 1,
            "components": [{
                "type": 2,
                "style": 1,
                "label": START_BUTTON_LABEL,
                "custom_id": START_BUTTON_ID,
                "disabled": disabled,
            }]
        }])
    }
}

#[async_trait]
impl ChatPlatform for DiscordRest {
    async fn member_role_ids(&self, user_id: &str) -> Result<Option<Vec<String>>, AppError> {
        let path = format!("/guilds/{}/members/{}", self.guild_id, user_id);
        let response = self.send(Method::GET, &path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(AppError::PlatformError(format!(
                "GET {} returned {}",
                path,
                response.status()
            )));
        }
        let member: GuildMember = response.json().await?;
        Ok(Some(member.roles))
    }

    async fn add_role(&self, user_id: &str, role_id: &str) -> Result<(), AppError> {
        let path = format!(
            "/guilds/{}/members/{}/roles/{}",
            self.guild_id, user_id, role_id
        );
        self.expect_success(Method::PUT, &path, None).await?;
        Ok(())
    }

    async fn remove_role(&self, user_id: &str, role_id: &str) -> Result<(), AppError> {
        let path = format!(
            "/guilds/{}/members/{}/roles/{}",
            self.guild_id, user_id, role_id
        );
        self.expect_success(Method::DELETE, &path, None).await?;
        Ok(())
    }

    async fn hide_channel(&self, channel_id: &str, user_id: &str) -> Result<(), AppError> {
        let path = format!("/channels/{}/permissions/{}", channel_id, user_id);
        let body = json!({
            "type": OVERWRITE_MEMBER,
            "allow": "0",
            "deny": VIEW_CHANNEL.to_string(),
        });
        self.expect_success(Method::PUT, &path, Some(body)).await?;
        Ok(())
    }

    async fn restore_channel_access(
        &self,
        channel_id: &str,
        user_id: &str,
    ) -> Result<(), AppError> {
        let path = format!("/channels/{}/permissions/{}", channel_id, user_id);
        let response = self.send(Method::DELETE, &path, None).await?;
        // No overwrite to delete is fine.
        if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }
        Err(AppError::PlatformError(format!(
            "DELETE {} returned {}",
            path,
            response.status()
        )))
    }

    async fn post_start_prompt(
        &self,
        channel_id: &str,
        prompt: &StartPrompt,
    ) -> Result<String, AppError> {
        let path = format!("/channels/{}/messages", channel_id);
        let mut body = json!({
            "embeds": [{
                "title": prompt.title,
                "description": prompt.description,
            }],
            "components": Self::start_row(false),
        });
        if let Some(user_id) = &prompt.mention_user_id {
            body["content"] = json!(format!("<@{}>", user_id));
        }

        let created: CreatedMessage = self
            .expect_success(Method::POST, &path, Some(body))
            .await?
            .json()
            .await?;
        Ok(created.id)
    }

    async fn latest_start_prompt(&self, channel_id: &str) -> Result<Option<String>, AppError> {
        let bot_user_id = self.bot_user_id().await?;
        let path = format!(
            "/channels/{}/messages?limit={}",
            channel_id, START_PROMPT_SCAN_LIMIT
        );
        // Newest first.
        let messages: Vec<ChannelMessage> = self
            .expect_success(Method::GET, &path, None)
            .await?
            .json()
            .await?;

        Ok(messages
            .into_iter()
            .find(|m| m.is_start_prompt_from(bot_user_id))
            .map(|m| m.id))
    }

    async fn disable_start_prompt(
        &self,
        channel_id: &str,
        message_id: &str,
    ) -> Result<(), AppError> {
        let path = format!("/channels/{}/messages/{}", channel_id, message_id);
        let body = json!({ "components": Self::start_row(true) });
        self.expect_success(Method::PATCH, &path, Some(body)).await?;
        Ok(())
    }

    async fn send_alert(&self, message: &str) -> Result<(), AppError> {
        let Some(channel_id) = &self.alert_channel_id else {
            tracing::debug!("No alert channel configured, dropping alert: {}", message);
            return Ok(());
        };
        let path = format!("/channels/{}/messages", channel_id);
        let content: String = message.chars().take(1900).collect();
        self.expect_success(Method::POST, &path, Some(json!({ "content": content })))
            .await?;
        Ok(())
    }
}
