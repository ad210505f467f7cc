use serenity::all::{ChannelId, GuildId, Message, MessageId, UserId};

/// Unfurled link metadata attached to a message at the time it was fetched
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmbedSnapshot {
    /// Canonical URL the unfurling service resolved the link to
    pub url: Option<String>,
    /// Display name of the embed author (the tweet's author)
    pub author_name: Option<String>,
}

impl EmbedSnapshot {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            author_name: None,
        }
    }
}

/// Platform-neutral view of a chat message, as seen by the detection and status logic
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub guild_id: Option<GuildId>,
    pub author_id: UserId,
    pub content: String,
    pub embeds: Vec<EmbedSnapshot>,
    /// Message this one replies to, if any
    pub reference: Option<MessageId>,
}

impl ChatMessage {
    pub fn has_embed(&self) -> bool {
        !self.embeds.is_empty()
    }

    pub fn first_embed(&self) -> Option<&EmbedSnapshot> {
        self.embeds.first()
    }

    /// Jump link used when reporting a message for manual follow-up
    pub fn link(&self) -> String {
        format!("{}/{}", channel_link(self.guild_id, self.channel_id), self.id)
    }
}

/// Jump link to a channel or thread; `@me` stands in for the guild in DMs
pub fn channel_link(guild_id: Option<GuildId>, channel_id: ChannelId) -> String {
    let guild = guild_id
        .map(|g| g.to_string())
        .unwrap_or_else(|| "@me".to_string());
    format!("https://discord.com/channels/{}/{}", guild, channel_id)
}

impl From<&Message> for ChatMessage {
    fn from(msg: &Message) -> Self {
        let embeds = msg
            .embeds
            .iter()
            .map(|embed| EmbedSnapshot {
                url: embed.url.clone(),
                author_name: embed
                    .author
                    .as_ref()
                    .map(|a| a.name.clone())
                    .filter(|name| !name.is_empty()),
            })
            .collect();

        Self {
            id: msg.id,
            channel_id: msg.channel_id,
            guild_id: msg.guild_id,
            author_id: msg.author.id,
            content: msg.content.clone(),
            embeds,
            reference: msg.message_reference.as_ref().and_then(|r| r.message_id),
        }
    }
}

/// One interactive button on an outgoing message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlButton {
    pub custom_id: String,
    pub label: String,
}
