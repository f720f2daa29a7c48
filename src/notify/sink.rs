use std::sync::Arc;

use async_trait::async_trait;
use serenity::all::{ChannelId, CreateEmbed, CreateMessage, MessageId, ReactionType};
use serenity::http::Http;

use crate::error::BotError;

/// Platform-agnostic embed payload. The sink decides how it is rendered.
#[derive(Debug, Clone, Default)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub fields: Vec<EmbedField>,
}

#[derive(Debug, Clone)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

/// Outbound messaging seam. Each operation fails independently; the
/// dispatcher logs and drops failures rather than retrying.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Sends plain text and returns the platform message id.
    async fn send_text(&self, channel_id: u64, content: &str) -> Result<u64, BotError>;

    /// Sends an embed and returns the platform message id.
    async fn send_embed(&self, channel_id: u64, embed: &Embed) -> Result<u64, BotError>;

    /// Attaches a reaction to an already-sent message.
    async fn add_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: &str,
    ) -> Result<(), BotError>;
}

/// Discord-backed sink over serenity's HTTP client.
pub struct DiscordSink {
    http: Arc<Http>,
}

impl DiscordSink {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl MessageSink for DiscordSink {
    async fn send_text(&self, channel_id: u64, content: &str) -> Result<u64, BotError> {
        let message = ChannelId::new(channel_id).say(&self.http, content).await?;
        Ok(message.id.get())
    }

    async fn send_embed(&self, channel_id: u64, embed: &Embed) -> Result<u64, BotError> {
        let mut builder = CreateEmbed::new()
            .title(embed.title.clone())
            .description(embed.description.clone())
            .colour(embed.color);
        for field in &embed.fields {
            builder = builder.field(field.name.clone(), field.value.clone(), field.inline);
        }

        let message = ChannelId::new(channel_id)
            .send_message(&self.http, CreateMessage::new().embed(builder))
            .await?;
        Ok(message.id.get())
    }

    async fn add_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        emoji: &str,
    ) -> Result<(), BotError> {
        self.http
            .create_reaction(
                ChannelId::new(channel_id),
                MessageId::new(message_id),
                &ReactionType::Unicode(emoji.to_string()),
            )
            .await?;
        Ok(())
    }
}
